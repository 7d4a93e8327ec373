//! aqmon - air-quality monitor firmware core.
//!
//! Everything that decides *what* the device does lives here and builds
//! on the host: the timer gate, sensor normalization, the WiFi/MQTT state
//! machine, telemetry encoding, screen composition and the scheduler that
//! ties them together. Hardware sits behind small traits
//! ([`WifiLink`], [`MqttTransport`], [`ClimateSensor`], [`GasSensor`]) and
//! the embedded-graphics `DrawTarget`.
//!
//! Usage: `cargo test` runs the whole core on the host.
//!
//! The firmware (`main.rs`, `--features embedded`) adds the board drivers
//! under `board` and `net` and the SSD1306 wrapper in `ui::display`.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod connectivity;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod sensor;
pub mod telemetry;
pub mod timer;
pub mod ui;

#[cfg(feature = "embedded")]
pub mod board;
#[cfg(feature = "embedded")]
pub mod net;

pub use config::DeviceConfig;
pub use connectivity::{ConnectionState, Connectivity, LinkStatus, MqttTransport, WifiLink};
pub use error::{EncodeError, Error, MqttError};
pub use event::{Event, EventQueue, SkipReason};
pub use scheduler::{Device, TickReport};
pub use sensor::{ClimateSensor, GasSensor, Sampler, SensorSnapshot};
pub use telemetry::{PublishOutcome, Publisher};
pub use ui::{Presenter, Screen, View};
