//! aqmon firmware - Raspberry Pi Pico 2 W (RP2350 + CYW43439).
//!
//! Brings up the board, builds the [`Device`] and runs its tick loop:
//! tick, flush the display when a frame was drawn, log the queued events,
//! sleep `IDLE_DELAY_MS`.
//!
//! Credentials are baked in at build time:
//!
//! ```text
//! WIFI_SSID=... WIFI_PSK=... MQTT_BROKER=... MQTT_TOKEN=... \
//!     cargo run --release --features embedded --target thumbv8m.main-none-eabihf
//! ```
//!
//! Optional: `MQTT_PORT`, `MQTT_TOPIC`, `MQTT_CLIENT_ID`.

#![no_std]
#![no_main]

use aqmon::board::{Dht22Sensor, Mq135Sensor};
use aqmon::config::{DeviceConfig, DISPLAY_I2C_FREQUENCY_HZ, IDLE_DELAY_MS};
use aqmon::net::mqtt::{BrokerSession, SocketBuffers};
use aqmon::net::wifi::{self, WifiPins};
use aqmon::ui::display;
use aqmon::{Device, Event, Sampler, SkipReason};
use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Level, OutputOpenDrain, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_time::{Instant, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

/// Seed for the IP stack's port and sequence randomization.
const NET_SEED: u64 = 0x5eed_a9a0_0b5e_c0de;

fn device_config() -> DeviceConfig<'static> {
    let mut config = DeviceConfig::new(
        env!("WIFI_SSID"),
        env!("WIFI_PSK"),
        env!("MQTT_BROKER"),
        match option_env!("MQTT_CLIENT_ID") {
            Some(id) => id,
            None => "aqmon",
        },
        env!("MQTT_TOKEN"),
    );
    if let Some(port) = option_env!("MQTT_PORT").and_then(|p| p.parse().ok()) {
        config.broker_port = port;
    }
    if let Some(topic) = option_env!("MQTT_TOPIC") {
        config.topic = topic;
    }
    config
}

/// Millisecond counter for the scheduler. Truncation to 32 bits is the
/// wrapping clock the timer gate expects.
fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

fn log_event(event: &Event) {
    match event {
        Event::ConnectStarted { attempt } => info!("WiFi: connecting, attempt {}", attempt),
        Event::Associated { ip: Some(ip) } => {
            info!("WiFi: connected, ip={}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])
        }
        Event::Associated { ip: None } => info!("WiFi: connected"),
        Event::AssociationTimedOut => warn!("WiFi: connection timed out"),
        Event::LinkLost => warn!("WiFi: link lost"),
        Event::MqttConnected => info!("MQTT: connected"),
        Event::MqttConnectFailed { error } => warn!("MQTT: connect failed, rc={}", error.code),
        Event::MqttDropped => warn!("MQTT: session dropped"),
        Event::Sampled(s) => info!(
            "Sensors: T={}C H={}% AQ={}",
            s.temperature, s.humidity, s.air_quality
        ),
        Event::Published { len } => info!("Telemetry: sent {} bytes", len),
        Event::PublishSkipped(SkipReason::InvalidReading) => {
            warn!("Telemetry: invalid reading, not sent")
        }
        Event::PublishSkipped(reason) => warn!("Telemetry: not sent ({})", reason),
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("aqmon starting");
    let p = embassy_rp::init(Default::default());

    // Display
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = DISPLAY_I2C_FREQUENCY_HZ;
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c_config);
    let mut oled = display::init(i2c);

    // Sensors
    let dht = Dht22Sensor::new(OutputOpenDrain::new(p.PIN_15, Level::High));
    let converter = Adc::new_blocking(p.ADC, adc::Config::default());
    let mq135 = Mq135Sensor::new(converter, adc::Channel::new_pin(p.PIN_26, Pull::None));

    // Network
    let pins = WifiPins {
        pwr: p.PIN_23,
        dio: p.PIN_24,
        cs: p.PIN_25,
        clk: p.PIN_29,
        pio: p.PIO0,
        dma: p.DMA_CH0,
    };
    let (link, stack) = wifi::init(spawner, pins, NET_SEED).await;

    let config = device_config();
    static SOCKET_BUFFERS: StaticCell<SocketBuffers> = StaticCell::new();
    let session = BrokerSession::new(
        stack,
        SOCKET_BUFFERS.init(SocketBuffers::new()),
        config.broker_host,
        config.broker_port,
    );

    let mut device = Device::new(config, link, session, Sampler::new(dht, mq135));
    device.start(now_ms());
    let mut panel_ok = true;

    loop {
        let report = device.tick(now_ms(), &mut oled).await;
        if report.screen.is_some() {
            match display::flush(&mut oled) {
                Ok(()) => panel_ok = true,
                Err(e) if panel_ok => {
                    warn!("Display: flush failed: {}", e);
                    panel_ok = false;
                }
                Err(_) => {}
            }
        }
        if report.published.is_some() {
            info!(
                "Telemetry: {} sent, {} skipped",
                device.publisher().sent(),
                device.publisher().skipped()
            );
        }
        while let Some(event) = device.pop_event() {
            log_event(&event);
        }
        Timer::after_millis(IDLE_DELAY_MS).await;
    }
}
