//! Application-wide constants and injected device configuration.
//!
//! All timing parameters, protocol limits and pin assignments live here so
//! they can be tuned in one place. Credentials and broker coordinates are
//! not constants: they are carried by [`DeviceConfig`] and handed to the
//! [`Device`](crate::scheduler::Device) at startup.

// Scheduler cadence

/// Sensor sampling (and telemetry) interval (ms).
pub const SENSOR_INTERVAL_MS: u32 = 2_000;

/// Display redraw + connectivity poll interval (ms).
pub const DISPLAY_INTERVAL_MS: u32 = 500;

/// Idle sleep between two scheduler ticks (ms).
pub const IDLE_DELAY_MS: u64 = 10;

// WiFi

/// Give up on an association attempt after this long (ms).
pub const WIFI_TIMEOUT_MS: u32 = 10_000;

/// Flat interval between association attempts while disconnected (ms).
pub const WIFI_RETRY_INTERVAL_MS: u32 = 60_000;

/// How long the "WiFi connected" confirmation stays on screen (ms).
pub const CONFIRMATION_SCREEN_MS: u32 = 2_000;

// MQTT

/// Minimum spacing between two MQTT connect attempts (ms).
pub const MQTT_RETRY_INTERVAL_MS: u32 = 10_000;

/// MQTT keep-alive advertised to the broker (seconds).
pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;

/// Default broker port (plain TCP).
pub const MQTT_DEFAULT_PORT: u16 = 1883;

/// Upper bound of one telemetry message, in bytes.
pub const TELEMETRY_MAX_LEN: usize = 100;

// Sensors

/// Reserved value marking a failed temperature/humidity reading.
///
/// Far outside the DHT22 range (-40..80 °C, 0..100 %RH).
pub const INVALID_READING: f32 = -999.0;

/// Full-scale value of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

/// Full-scale value of the air-quality display range.
pub const AQ_SCALE_MAX: u16 = 1023;

// Diagnostics

/// Capacity of the diagnostic event queue drained by the firmware.
pub const EVENT_QUEUE_LEN: usize = 16;

// GPIO pin assignments (Raspberry Pi Pico 2 W)
//
// These are logical names; the actual `embassy_rp::peripherals::*` are
// selected in `main.rs`.
//
//   DHT22 data      → GP15
//   MQ135 analog    → GP26 (ADC0)
//   I²C SDA (OLED)  → GP4
//   I²C SCL (OLED)  → GP5
//   CYW43 PWR/CS    → GP23 / GP25 (fixed on the board)
//   CYW43 DIO/CLK   → GP24 / GP29 (fixed on the board)

/// I²C bus speed for the SSD1306 (Hz).
pub const DISPLAY_I2C_FREQUENCY_HZ: u32 = 400_000;

/// Runtime configuration: who to talk to and with which secrets.
///
/// Everything the device needs to reach its network and broker. The
/// firmware fills it from build-time environment variables; tests build
/// it by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig<'a> {
    /// WiFi network name.
    pub ssid: &'a str,
    /// WiFi pre-shared key.
    pub psk: &'a str,
    /// Broker host name or dotted IPv4 address.
    pub broker_host: &'a str,
    /// Broker TCP port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: &'a str,
    /// Pre-shared access token, sent as the MQTT password (no username).
    pub access_token: &'a str,
    /// Topic telemetry is published to.
    pub topic: &'a str,
    /// Treat a dropped link while connected as a disconnect.
    pub detect_link_loss: bool,
}

impl<'a> DeviceConfig<'a> {
    /// Configuration with the default port, topic and link-loss policy.
    pub const fn new(
        ssid: &'a str,
        psk: &'a str,
        broker_host: &'a str,
        client_id: &'a str,
        access_token: &'a str,
    ) -> Self {
        Self {
            ssid,
            psk,
            broker_host,
            broker_port: MQTT_DEFAULT_PORT,
            client_id,
            access_token,
            topic: "v1/devices/me/telemetry",
            detect_link_loss: true,
        }
    }
}
