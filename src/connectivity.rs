//! WiFi + MQTT connection state machine.
//!
//! ```text
//!                 begin()                   link Up
//!   Disconnected ─────────▶ Connecting ───────────────▶ Connected
//!        ▲   retry gate         │                          │
//!        │   (60 s, flat)       │ timeout (10 s, incl.)    │ link lost
//!        └──────────────────────┴──────────────────────────┘ (policy)
//! ```
//!
//! MQTT is a sub-state of `Connected`: while WiFi is up and the session is
//! down, a connect is attempted at most once per `MQTT_RETRY_INTERVAL_MS`.
//! MQTT failures never touch the WiFi state.
//!
//! Nothing here blocks or draws. Association is only *requested* through
//! [`WifiLink::begin`] and then polled; every transition is reported as an
//! [`Event`] and left to the presenter and the log.

use crate::config::{
    DeviceConfig, MQTT_RETRY_INTERVAL_MS, WIFI_RETRY_INTERVAL_MS, WIFI_TIMEOUT_MS,
};
use crate::error::MqttError;
use crate::event::{Event, EventQueue};
use crate::timer::{self, TimerMark};

/// WiFi connection state as seen by the rest of the firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Association in progress.
    Connecting,
    /// Link up.
    Connected,
    /// Waiting for the next retry.
    Disconnected,
}

/// What the radio driver reports about the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// No association requested.
    Idle,
    /// Join in progress.
    Associating,
    /// Associated with an address.
    Up,
    /// Last join attempt failed.
    Failed,
}

/// Radio side of the connection. All calls return immediately.
pub trait WifiLink {
    /// Request association with `ssid`. Progress is observed via [`status`](Self::status).
    fn begin(&mut self, ssid: &str, psk: &str);
    fn status(&self) -> LinkStatus;
    /// Drop the link or abort a pending association.
    fn disconnect(&mut self);
    fn local_ip(&self) -> Option<[u8; 4]>;
    fn rssi(&self) -> Option<i8>;
}

/// Broker session. Implementations own the socket and the protocol.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    /// Open a session, authenticating with `token` as password and no username.
    async fn connect(&mut self, client_id: &str, token: &str) -> Result<(), MqttError>;
    fn is_connected(&self) -> bool;
    /// Fire-and-forget publish at the default QoS.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError>;
    /// Keep-alive and inbound I/O. Called every tick; a closed session does
    /// nothing here.
    async fn service(&mut self);
    /// Drop the session without talking to the broker. Called when the WiFi
    /// link goes away under it.
    fn close(&mut self);
}

/// A state change reported by one of the polling operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Connecting → Connected.
    Associated,
    /// Connecting → Disconnected.
    TimedOut,
    /// Connected → Disconnected.
    LinkLost,
    /// Disconnected → Connecting.
    Retrying,
}

/// Owner of the WiFi and MQTT connection state.
pub struct Connectivity<'a> {
    config: DeviceConfig<'a>,
    state: ConnectionState,
    mqtt_connected: bool,
    connect_started: TimerMark,
    wifi_retry: TimerMark,
    mqtt_retry: TimerMark,
    attempts: u32,
    mqtt_failures: u32,
    last_mqtt_error: Option<MqttError>,
}

impl<'a> Connectivity<'a> {
    /// Idle machine. Call [`start_connection`](Self::start_connection) to begin.
    pub fn new(config: DeviceConfig<'a>) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            mqtt_connected: false,
            connect_started: TimerMark::default(),
            wifi_retry: TimerMark::default(),
            mqtt_retry: TimerMark::default(),
            attempts: 0,
            mqtt_failures: 0,
            last_mqtt_error: None,
        }
    }

    pub fn config(&self) -> &DeviceConfig<'a> {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_wifi_up(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_mqtt_connected(&self) -> bool {
        self.mqtt_connected
    }

    /// WiFi and MQTT both up: telemetry may be sent.
    pub fn is_fully_connected(&self) -> bool {
        self.is_wifi_up() && self.mqtt_connected
    }

    /// Association attempts since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn mqtt_failures(&self) -> u32 {
        self.mqtt_failures
    }

    pub fn last_mqtt_error(&self) -> Option<MqttError> {
        self.last_mqtt_error
    }

    /// Milliseconds since the current association attempt started.
    pub fn connecting_for(&self, now: u32) -> u32 {
        timer::since(self.connect_started.at(), now)
    }

    /// Whole seconds left before the current attempt times out, floored at 0.
    pub fn remaining_timeout_secs(&self, now: u32) -> u32 {
        WIFI_TIMEOUT_MS.saturating_sub(self.connecting_for(now)) / 1000
    }

    /// Begin an association attempt.
    pub fn start_connection(&mut self, now: u32, link: &mut impl WifiLink, events: &mut EventQueue) {
        self.state = ConnectionState::Connecting;
        self.mqtt_connected = false;
        self.connect_started.reset(now);
        self.wifi_retry.reset(now);
        self.attempts = self.attempts.wrapping_add(1);
        link.begin(self.config.ssid, self.config.psk);
        events.push(Event::ConnectStarted {
            attempt: self.attempts,
        });
    }

    /// Look at the link and move Connecting → Connected (or, when the
    /// link-loss policy is on, Connected → Disconnected).
    pub fn poll_status(
        &mut self,
        now: u32,
        link: &impl WifiLink,
        events: &mut EventQueue,
    ) -> Option<Transition> {
        let up = link.status() == LinkStatus::Up;
        match self.state {
            ConnectionState::Connecting if up => {
                self.state = ConnectionState::Connected;
                events.push(Event::Associated {
                    ip: link.local_ip(),
                });
                Some(Transition::Associated)
            }
            ConnectionState::Connected if !up && self.config.detect_link_loss => {
                self.state = ConnectionState::Disconnected;
                self.mqtt_connected = false;
                self.wifi_retry.reset(now);
                events.push(Event::LinkLost);
                Some(Transition::LinkLost)
            }
            _ => None,
        }
    }

    /// Abandon an association attempt that has run for `WIFI_TIMEOUT_MS`.
    pub fn check_timeout(
        &mut self,
        now: u32,
        link: &mut impl WifiLink,
        events: &mut EventQueue,
    ) -> Option<Transition> {
        if self.state != ConnectionState::Connecting
            || !self.connect_started.is_due(WIFI_TIMEOUT_MS, now)
        {
            return None;
        }
        link.disconnect();
        self.state = ConnectionState::Disconnected;
        events.push(Event::AssociationTimedOut);
        Some(Transition::TimedOut)
    }

    /// Start a new attempt once the flat retry interval has passed.
    pub fn maybe_retry(
        &mut self,
        now: u32,
        link: &mut impl WifiLink,
        events: &mut EventQueue,
    ) -> Option<Transition> {
        if self.state != ConnectionState::Disconnected
            || !self.wifi_retry.is_due(WIFI_RETRY_INTERVAL_MS, now)
        {
            return None;
        }
        self.start_connection(now, link, events);
        Some(Transition::Retrying)
    }

    /// MQTT connect if WiFi is up, the session is down and the retry gate
    /// allows it. Returns `None` when no attempt was made.
    pub async fn reconnect_mqtt(
        &mut self,
        now: u32,
        mqtt: &mut impl MqttTransport,
        events: &mut EventQueue,
    ) -> Option<Result<(), MqttError>> {
        if !self.is_wifi_up() {
            return None;
        }
        self.sync_mqtt(mqtt, events);
        if self.mqtt_connected || !self.mqtt_retry.is_due(MQTT_RETRY_INTERVAL_MS, now) {
            return None;
        }
        Some(self.connect_mqtt(now, mqtt, events).await)
    }

    /// Ungated MQTT connect, used right after association.
    pub async fn connect_mqtt(
        &mut self,
        now: u32,
        mqtt: &mut impl MqttTransport,
        events: &mut EventQueue,
    ) -> Result<(), MqttError> {
        self.mqtt_retry.reset(now);
        match mqtt
            .connect(self.config.client_id, self.config.access_token)
            .await
        {
            Ok(()) => {
                self.mqtt_connected = true;
                events.push(Event::MqttConnected);
                Ok(())
            }
            Err(error) => {
                self.mqtt_connected = false;
                self.mqtt_failures = self.mqtt_failures.wrapping_add(1);
                self.last_mqtt_error = Some(error);
                events.push(Event::MqttConnectFailed { error });
                Err(error)
            }
        }
    }

    /// Mirror the transport's view of the session into our flag.
    pub fn sync_mqtt(&mut self, mqtt: &impl MqttTransport, events: &mut EventQueue) {
        if self.mqtt_connected && !mqtt.is_connected() {
            self.mqtt_connected = false;
            events.push(Event::MqttDropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FakeLink {
        status: LinkStatus,
        begins: u32,
        disconnects: u32,
    }

    impl FakeLink {
        fn new() -> Self {
            Self {
                status: LinkStatus::Idle,
                begins: 0,
                disconnects: 0,
            }
        }
    }

    impl WifiLink for FakeLink {
        fn begin(&mut self, _ssid: &str, _psk: &str) {
            self.begins += 1;
            self.status = LinkStatus::Associating;
        }
        fn status(&self) -> LinkStatus {
            self.status
        }
        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.status = LinkStatus::Idle;
        }
        fn local_ip(&self) -> Option<[u8; 4]> {
            (self.status == LinkStatus::Up).then_some([192, 168, 1, 42])
        }
        fn rssi(&self) -> Option<i8> {
            None
        }
    }

    struct FakeMqtt {
        refuse_with: Option<MqttError>,
        connected: bool,
        attempts: u32,
    }

    impl MqttTransport for FakeMqtt {
        async fn connect(&mut self, _client_id: &str, _token: &str) -> Result<(), MqttError> {
            self.attempts += 1;
            match self.refuse_with {
                Some(e) => Err(e),
                None => {
                    self.connected = true;
                    Ok(())
                }
            }
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        async fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), MqttError> {
            Ok(())
        }
        async fn service(&mut self) {}
        fn close(&mut self) {
            self.connected = false;
        }
    }

    fn config() -> DeviceConfig<'static> {
        DeviceConfig::new("lab", "secret", "10.0.0.2", "aqmon-1", "token")
    }

    #[test]
    fn start_connection_requests_association() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();

        conn.start_connection(100, &mut link, &mut events);

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(link.begins, 1);
        assert_eq!(events.pop(), Some(Event::ConnectStarted { attempt: 1 }));
    }

    #[test]
    fn poll_moves_to_connected_when_link_up() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);

        assert_eq!(conn.poll_status(500, &link, &mut events), None);
        link.status = LinkStatus::Up;
        assert_eq!(
            conn.poll_status(1_000, &link, &mut events),
            Some(Transition::Associated)
        );
        assert!(conn.is_wifi_up());
        assert!(events
            .iter()
            .any(|e| *e == Event::Associated { ip: Some([192, 168, 1, 42]) }));
    }

    #[test]
    fn timeout_boundary_is_inclusive() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(1_000, &mut link, &mut events);

        assert_eq!(conn.check_timeout(10_999, &mut link, &mut events), None);
        assert_eq!(
            conn.check_timeout(11_000, &mut link, &mut events),
            Some(Transition::TimedOut)
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(link.disconnects, 1);
        // Only once.
        assert_eq!(conn.check_timeout(11_500, &mut link, &mut events), None);
    }

    #[test]
    fn disconnected_never_jumps_to_connected() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);
        conn.check_timeout(WIFI_TIMEOUT_MS, &mut link, &mut events);

        link.status = LinkStatus::Up;
        assert_eq!(conn.poll_status(20_000, &link, &mut events), None);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // The retry passes through Connecting first.
        assert_eq!(
            conn.maybe_retry(60_000, &mut link, &mut events),
            Some(Transition::Retrying)
        );
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn retry_waits_for_flat_interval_from_last_start() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);
        conn.check_timeout(10_000, &mut link, &mut events);

        assert_eq!(conn.maybe_retry(59_999, &mut link, &mut events), None);
        assert!(conn.maybe_retry(60_000, &mut link, &mut events).is_some());
        assert_eq!(conn.attempts(), 2);
        assert_eq!(link.begins, 2);
    }

    #[test]
    fn remaining_timeout_floors_at_zero() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);

        assert_eq!(conn.remaining_timeout_secs(0), 10);
        assert_eq!(conn.remaining_timeout_secs(2_500), 7);
        assert_eq!(conn.remaining_timeout_secs(10_000), 0);
        assert_eq!(conn.remaining_timeout_secs(25_000), 0);
    }

    #[test]
    fn link_loss_drops_to_disconnected_when_enabled() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);
        link.status = LinkStatus::Up;
        conn.poll_status(500, &link, &mut events);

        link.status = LinkStatus::Idle;
        assert_eq!(
            conn.poll_status(5_000, &link, &mut events),
            Some(Transition::LinkLost)
        );
        assert!(!conn.is_mqtt_connected());
        assert_eq!(conn.maybe_retry(64_999, &mut link, &mut events), None);
        assert!(conn.maybe_retry(65_000, &mut link, &mut events).is_some());
    }

    #[test]
    fn link_loss_ignored_when_disabled() {
        let mut cfg = config();
        cfg.detect_link_loss = false;
        let mut conn = Connectivity::new(cfg);
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        conn.start_connection(0, &mut link, &mut events);
        link.status = LinkStatus::Up;
        conn.poll_status(500, &link, &mut events);

        link.status = LinkStatus::Idle;
        assert_eq!(conn.poll_status(5_000, &link, &mut events), None);
        assert!(conn.is_wifi_up());
    }

    #[test]
    fn mqtt_reconnect_is_gated_and_keeps_wifi_state() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        let mut mqtt = FakeMqtt {
            refuse_with: Some(MqttError::broker(5)),
            connected: false,
            attempts: 0,
        };
        conn.start_connection(0, &mut link, &mut events);
        link.status = LinkStatus::Up;
        conn.poll_status(500, &link, &mut events);

        let first = block_on(conn.connect_mqtt(500, &mut mqtt, &mut events));
        assert_eq!(first, Err(MqttError::broker(5)));
        assert_eq!(block_on(conn.reconnect_mqtt(10_499, &mut mqtt, &mut events)), None);
        assert_eq!(
            block_on(conn.reconnect_mqtt(10_500, &mut mqtt, &mut events)),
            Some(Err(MqttError::broker(5)))
        );
        assert_eq!(mqtt.attempts, 2);
        assert_eq!(conn.mqtt_failures(), 2);
        assert_eq!(conn.last_mqtt_error(), Some(MqttError::broker(5)));
        assert!(conn.is_wifi_up());
        assert!(!conn.is_fully_connected());
    }

    #[test]
    fn mqtt_not_attempted_without_wifi() {
        let mut conn = Connectivity::new(config());
        let mut events = EventQueue::new();
        let mut mqtt = FakeMqtt {
            refuse_with: None,
            connected: false,
            attempts: 0,
        };
        assert_eq!(block_on(conn.reconnect_mqtt(50_000, &mut mqtt, &mut events)), None);
        assert_eq!(mqtt.attempts, 0);
    }

    #[test]
    fn dropped_session_is_noticed() {
        let mut conn = Connectivity::new(config());
        let mut link = FakeLink::new();
        let mut events = EventQueue::new();
        let mut mqtt = FakeMqtt {
            refuse_with: None,
            connected: false,
            attempts: 0,
        };
        conn.start_connection(0, &mut link, &mut events);
        link.status = LinkStatus::Up;
        conn.poll_status(500, &link, &mut events);
        assert_eq!(block_on(conn.connect_mqtt(500, &mut mqtt, &mut events)), Ok(()));
        assert!(conn.is_fully_connected());

        mqtt.connected = false;
        conn.sync_mqtt(&mqtt, &mut events);
        assert!(!conn.is_mqtt_connected());
        assert!(events.iter().any(|e| *e == Event::MqttDropped));
    }
}
