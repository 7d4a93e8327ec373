//! Sensor sampling - DHT22 climate reading + MQ135 air-quality reading.
//!
//! The drivers themselves live in the firmware (`board` module); this
//! module only normalizes what they return into a [`SensorSnapshot`]:
//!
//! - a NaN temperature or humidity becomes [`INVALID_READING`]
//! - the raw 12-bit ADC value is rescaled to `0..=AQ_SCALE_MAX`
//!
//! No retries happen here. A failed read is surfaced once and the next
//! sampling tick tries again.

use crate::config::{ADC_MAX, AQ_SCALE_MAX, INVALID_READING};

/// Temperature / humidity source.
pub trait ClimateSensor {
    /// Read `(temperature °C, relative humidity %)`. NaN marks a failed read.
    fn read(&mut self) -> (f32, f32);
}

/// Analog gas sensor behind the ADC.
pub trait GasSensor {
    /// Raw ADC reading, `0..=ADC_MAX`.
    fn read_raw(&mut self) -> u16;
}

/// One immutable set of readings, replaced on every sampling tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSnapshot {
    /// Degrees Celsius, or [`INVALID_READING`].
    pub temperature: f32,
    /// Relative humidity in percent, or [`INVALID_READING`].
    pub humidity: f32,
    /// MQ135 reading rescaled to `0..=AQ_SCALE_MAX`.
    pub air_quality: u16,
}

impl SensorSnapshot {
    /// Snapshot used before the first sample: everything invalid.
    pub const fn empty() -> Self {
        Self {
            temperature: INVALID_READING,
            humidity: INVALID_READING,
            air_quality: 0,
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        valid(self.temperature)
    }

    pub fn humidity(&self) -> Option<f32> {
        valid(self.humidity)
    }

    /// Both climate readings are usable.
    pub fn is_complete(&self) -> bool {
        self.temperature().is_some() && self.humidity().is_some()
    }
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

fn valid(value: f32) -> Option<f32> {
    if is_invalid(value) {
        None
    } else {
        Some(value)
    }
}

/// True for the sentinel (and for anything that slipped through as NaN).
pub fn is_invalid(value: f32) -> bool {
    value.is_nan() || value == INVALID_READING
}

/// Replace a NaN reading with the sentinel.
pub fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        INVALID_READING
    } else {
        value
    }
}

/// Linear rescale of a raw ADC value into the air-quality display range.
///
/// Inputs above `ADC_MAX` are clamped first, so the result never leaves
/// `0..=AQ_SCALE_MAX` and is monotonically non-decreasing in `raw`.
pub fn rescale_adc(raw: u16) -> u16 {
    let raw = raw.min(ADC_MAX) as u32;
    (raw * AQ_SCALE_MAX as u32 / ADC_MAX as u32) as u16
}

/// Reads both sensors and builds snapshots.
pub struct Sampler<C, G> {
    climate: C,
    gas: G,
}

impl<C: ClimateSensor, G: GasSensor> Sampler<C, G> {
    pub fn new(climate: C, gas: G) -> Self {
        Self { climate, gas }
    }

    /// Take one fresh snapshot.
    pub fn sample(&mut self) -> SensorSnapshot {
        let (temperature, humidity) = self.climate.read();
        let raw = self.gas.read_raw();
        SensorSnapshot {
            temperature: sanitize(temperature),
            humidity: sanitize(humidity),
            air_quality: rescale_adc(raw),
        }
    }
}
