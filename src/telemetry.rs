//! Telemetry message encoding and publishing.
//!
//! Wire format (JSON, at most `TELEMETRY_MAX_LEN` bytes):
//! ```text
//! {"temperature":23.4,"humidity":45.2,"mq135":512}
//! ```
//! Temperature and humidity carry one decimal; `mq135` is the rescaled
//! air-quality reading. A snapshot with an invalid climate reading is
//! never sent - the whole message is skipped, not just the bad field.

use core::fmt::Write;

use crate::config::TELEMETRY_MAX_LEN;
use crate::connectivity::{Connectivity, MqttTransport};
use crate::error::EncodeError;
use crate::event::{Event, EventQueue, SkipReason};
use crate::sensor::SensorSnapshot;
use heapless::String;

/// Encoded telemetry message.
pub type Message = String<TELEMETRY_MAX_LEN>;

/// Serialize `snapshot`. The caller has already checked validity.
pub fn encode(snapshot: &SensorSnapshot) -> Result<Message, EncodeError> {
    let mut msg = Message::new();
    write!(
        msg,
        "{{\"temperature\":{:.1},\"humidity\":{:.1},\"mq135\":{}}}",
        snapshot.temperature, snapshot.humidity, snapshot.air_quality
    )
    .map_err(|_| EncodeError::Overflow)?;
    Ok(msg)
}

/// Result of one publish call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishOutcome {
    /// Handed to the transport (delivery is not confirmed).
    Sent,
    Skipped(SkipReason),
}

/// Sends snapshots to the configured topic.
#[derive(Default)]
pub struct Publisher {
    sent: u32,
    skipped: u32,
}

impl Publisher {
    pub const fn new() -> Self {
        Self { sent: 0, skipped: 0 }
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Publish `snapshot` if both links are up and the readings are valid.
    ///
    /// Transport errors are not reported here; a broken session shows up
    /// on the next connectivity check.
    pub async fn publish(
        &mut self,
        snapshot: &SensorSnapshot,
        conn: &Connectivity<'_>,
        mqtt: &mut impl MqttTransport,
        events: &mut EventQueue,
    ) -> PublishOutcome {
        if !conn.is_fully_connected() {
            return self.skip(SkipReason::NotConnected, events);
        }
        if !snapshot.is_complete() {
            return self.skip(SkipReason::InvalidReading, events);
        }
        let msg = match encode(snapshot) {
            Ok(msg) => msg,
            Err(EncodeError::Overflow) => return self.skip(SkipReason::Overflow, events),
        };

        let _ = mqtt.publish(conn.config().topic, msg.as_bytes()).await;
        self.sent = self.sent.wrapping_add(1);
        events.push(Event::Published { len: msg.len() });
        PublishOutcome::Sent
    }

    fn skip(&mut self, reason: SkipReason, events: &mut EventQueue) -> PublishOutcome {
        self.skipped = self.skipped.wrapping_add(1);
        events.push(Event::PublishSkipped(reason));
        PublishOutcome::Skipped(reason)
    }
}
