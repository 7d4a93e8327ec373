//! Network subsystem - CYW43439 WiFi and the MQTT broker session.
//!
//! ## Components
//!
//! - **WiFi** (`wifi`): radio bring-up, the join/leave task and [`wifi::CywLink`]
//! - **MQTT** (`mqtt`): [`mqtt::BrokerSession`] over an embassy-net TCP socket

pub mod mqtt;
pub mod wifi;
