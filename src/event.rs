//! Diagnostic events emitted by the core.
//!
//! The library never logs directly. Components push [`Event`]s into an
//! [`EventQueue`]; the firmware drains it after every tick and prints each
//! entry over defmt-rtt.

use crate::config::EVENT_QUEUE_LEN;
use crate::error::MqttError;
use crate::sensor::SensorSnapshot;
use heapless::Deque;

/// Why a telemetry message was not sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SkipReason {
    /// Temperature or humidity carried the invalid sentinel.
    InvalidReading,
    /// WiFi or MQTT was down.
    NotConnected,
    /// The message did not fit the size limit.
    Overflow,
}

/// Something worth a line in the diagnostic log.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Association requested (attempt counter starts at 1).
    ConnectStarted { attempt: u32 },
    /// Link is up.
    Associated { ip: Option<[u8; 4]> },
    /// Association did not complete within the timeout.
    AssociationTimedOut,
    /// Link dropped while connected.
    LinkLost,
    /// MQTT session established.
    MqttConnected,
    /// MQTT connect attempt failed.
    MqttConnectFailed { error: MqttError },
    /// MQTT session went away without us closing it.
    MqttDropped,
    /// Fresh sensor snapshot.
    Sampled(SensorSnapshot),
    /// Telemetry handed to the transport.
    Published { len: usize },
    /// Telemetry not sent.
    PublishSkipped(SkipReason),
}

/// Bounded FIFO of events; the oldest entry is dropped when full.
pub struct EventQueue {
    events: Deque<Event, EVENT_QUEUE_LEN>,
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        let _ = self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events lost to overflow since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
