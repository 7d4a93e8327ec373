//! Sensor drivers for the Pico 2 W board.
//!
//! - DHT22 on GP15, bit-banged through an open-drain pin
//! - MQ135 analog output on GP26 (ADC0), read with the blocking ADC API

use crate::sensor::{ClimateSensor, GasSensor};
use defmt::warn;
use dht22_sensor::{Dht22, DhtError};
use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_rp::gpio::OutputOpenDrain;
use embassy_time::Delay;

/// DHT22 temperature / humidity sensor.
pub struct Dht22Sensor {
    pin: OutputOpenDrain<'static>,
    delay: Delay,
}

impl Dht22Sensor {
    pub fn new(pin: OutputOpenDrain<'static>) -> Self {
        Self { pin, delay: Delay }
    }
}

impl ClimateSensor for Dht22Sensor {
    fn read(&mut self) -> (f32, f32) {
        let mut sensor = Dht22::new(&mut self.pin, &mut self.delay);
        match sensor.read() {
            Ok(reading) => (reading.temperature, reading.relative_humidity),
            Err(err) => {
                match err {
                    DhtError::ChecksumMismatch => warn!("DHT22: checksum error"),
                    DhtError::Timeout => warn!("DHT22: timeout"),
                    DhtError::PinError(_) => warn!("DHT22: pin error"),
                }
                (f32::NAN, f32::NAN)
            }
        }
    }
}

/// MQ135 gas sensor behind ADC0.
pub struct Mq135Sensor {
    adc: Adc<'static, Blocking>,
    channel: Channel<'static>,
}

impl Mq135Sensor {
    pub fn new(adc: Adc<'static, Blocking>, channel: Channel<'static>) -> Self {
        Self { adc, channel }
    }
}

impl GasSensor for Mq135Sensor {
    fn read_raw(&mut self) -> u16 {
        match self.adc.blocking_read(&mut self.channel) {
            Ok(raw) => raw,
            Err(_) => {
                warn!("MQ135: ADC conversion failed");
                0
            }
        }
    }
}
