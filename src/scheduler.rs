//! Main scheduler - one cooperative tick driving every subsystem.
//!
//! [`Device`] is the single owner of all runtime state. The firmware calls
//! [`Device::tick`] in a loop with a short idle sleep in between; each tick
//! runs, in order:
//!
//! 1. sensor sampling (+ telemetry when fully connected), every `SENSOR_INTERVAL_MS`
//! 2. link poll, every `DISPLAY_INTERVAL_MS`
//! 3. association timeout and retry checks, every tick
//! 4. display redraw, every `DISPLAY_INTERVAL_MS`
//! 5. MQTT reconnect check, gated by `MQTT_RETRY_INTERVAL_MS`
//! 6. transport service, every tick
//!
//! Losing the link or abandoning an association closes the MQTT session.
//!
//! Nothing inside a tick waits on a timer. Transport calls are awaited in
//! place; association is only requested and polled.

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::DrawTarget;

use crate::config::{DeviceConfig, DISPLAY_INTERVAL_MS, SENSOR_INTERVAL_MS};
use crate::connectivity::{ConnectionState, Connectivity, MqttTransport, Transition, WifiLink};
use crate::event::{Event, EventQueue};
use crate::sensor::{ClimateSensor, GasSensor, Sampler, SensorSnapshot};
use crate::telemetry::{PublishOutcome, Publisher};
use crate::timer::{self, TimerMark};
use crate::ui::{Presenter, Screen, View};

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    /// A fresh snapshot was taken.
    pub sampled: bool,
    /// Telemetry result, when a publish was attempted.
    pub published: Option<PublishOutcome>,
    /// Connectivity transitions seen this tick: poll, timeout, retry.
    pub transitions: [Option<Transition>; 3],
    /// Screen drawn this tick. The caller flushes the surface when set.
    pub screen: Option<Screen>,
    /// An MQTT connect was attempted and its result.
    pub mqtt_attempt: Option<bool>,
}

/// All device state, owned in one place.
pub struct Device<'a, L, M, C, G> {
    conn: Connectivity<'a>,
    link: L,
    mqtt: M,
    sampler: Sampler<C, G>,
    publisher: Publisher,
    presenter: Presenter,
    events: EventQueue,
    snapshot: SensorSnapshot,
    sensor_timer: TimerMark,
    display_timer: TimerMark,
    last_tick: u32,
    uptime_ms: u64,
}

impl<'a, L, M, C, G> Device<'a, L, M, C, G>
where
    L: WifiLink,
    M: MqttTransport,
    C: ClimateSensor,
    G: GasSensor,
{
    pub fn new(config: DeviceConfig<'a>, link: L, mqtt: M, sampler: Sampler<C, G>) -> Self {
        Self {
            conn: Connectivity::new(config),
            link,
            mqtt,
            sampler,
            publisher: Publisher::new(),
            presenter: Presenter::new(),
            events: EventQueue::new(),
            snapshot: SensorSnapshot::empty(),
            sensor_timer: TimerMark::default(),
            display_timer: TimerMark::default(),
            last_tick: 0,
            uptime_ms: 0,
        }
    }

    /// Boot: arm the timers at `now` and request the first association.
    ///
    /// The timer marks start at `now`, so the first sample and the first
    /// redraw happen one interval after boot.
    pub fn start(&mut self, now: u32) {
        self.last_tick = now;
        self.sensor_timer.reset(now);
        self.display_timer.reset(now);
        self.conn.start_connection(now, &mut self.link, &mut self.events);
    }

    /// Run one scheduler pass at `now` (ms, wrapping).
    pub async fn tick<D>(&mut self, now: u32, surface: &mut D) -> TickReport
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let mut report = TickReport::default();
        self.uptime_ms += u64::from(timer::since(self.last_tick, now));
        self.last_tick = now;

        // Sensors, then telemetry
        if self.sensor_timer.fire(SENSOR_INTERVAL_MS, now) {
            self.snapshot = self.sampler.sample();
            self.events.push(Event::Sampled(self.snapshot));
            report.sampled = true;

            if self.conn.is_fully_connected() {
                let outcome = self
                    .publisher
                    .publish(&self.snapshot, &self.conn, &mut self.mqtt, &mut self.events)
                    .await;
                report.published = Some(outcome);
            }
        }

        // Connectivity: link poll on the display cadence, timeout and retry
        // gates every tick
        let display_due = self.display_timer.fire(DISPLAY_INTERVAL_MS, now);
        let mut polled = None;
        if display_due {
            polled = self.conn.poll_status(now, &self.link, &mut self.events);
            if polled == Some(Transition::Associated) {
                let result = self
                    .conn
                    .connect_mqtt(now, &mut self.mqtt, &mut self.events)
                    .await;
                report.mqtt_attempt = Some(result.is_ok());
            }
        }
        let timed_out = self.conn.check_timeout(now, &mut self.link, &mut self.events);
        let retried = self.conn.maybe_retry(now, &mut self.link, &mut self.events);
        report.transitions = [polled, timed_out, retried];
        for transition in report.transitions.iter().flatten() {
            self.on_transition(*transition, now);
        }

        if display_due {
            report.screen = self.redraw(surface, now);
        }

        // MQTT reconnect
        if let Some(result) = self
            .conn
            .reconnect_mqtt(now, &mut self.mqtt, &mut self.events)
            .await
        {
            report.mqtt_attempt = Some(result.is_ok());
        }

        // Transport I/O
        self.mqtt.service().await;
        self.conn.sync_mqtt(&self.mqtt, &mut self.events);

        report
    }

    fn on_transition(&mut self, transition: Transition, now: u32) {
        if matches!(transition, Transition::LinkLost | Transition::TimedOut) {
            self.mqtt.close();
        }
        self.presenter.on_transition(transition, now);
    }

    fn redraw<D>(&mut self, surface: &mut D, now: u32) -> Option<Screen>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let view = View {
            state: self.conn.state(),
            snapshot: self.snapshot,
            uptime_secs: self.uptime_secs(),
            network: self.conn.config().ssid,
            remaining_secs: self.conn.remaining_timeout_secs(now),
            ip: self.link.local_ip(),
            rssi: self.link.rssi(),
            mqtt_connected: self.conn.is_mqtt_connected(),
        };
        self.presenter.render(surface, &view, now).ok()
    }

    /// Next diagnostic event, oldest first.
    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// Events lost because the queue was not drained in time.
    pub fn dropped_events(&self) -> u32 {
        self.events.dropped()
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    /// Uptime since [`start`](Self::start), immune to counter wrap.
    pub fn uptime_secs(&self) -> u64 {
        self.uptime_ms / 1_000
    }

    pub fn connectivity(&self) -> &Connectivity<'a> {
        &self.conn
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn mqtt(&self) -> &M {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut M {
        &mut self.mqtt
    }
}
