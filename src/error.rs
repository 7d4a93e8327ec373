//! Unified error types for aqmon.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // MQTT
    /// The MQTT transport reported a failure.
    Mqtt(MqttError),

    // UI / Display
    /// I²C transaction to the display failed.
    Display,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Failure reported by an MQTT connect or publish.
///
/// `code` follows the usual client convention: negative values are
/// transport-level failures, positive values are broker reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MqttError {
    pub code: i16,
}

impl MqttError {
    /// The broker did not answer within the keep-alive window.
    pub const CONNECTION_TIMEOUT: Self = Self { code: -4 };
    /// The network connection broke.
    pub const CONNECTION_LOST: Self = Self { code: -3 };
    /// The TCP connection to the broker could not be opened.
    pub const CONNECT_FAILED: Self = Self { code: -2 };
    /// The client is not connected.
    pub const DISCONNECTED: Self = Self { code: -1 };

    /// Wrap a broker-provided reason code.
    pub const fn broker(code: u8) -> Self {
        Self { code: code as i16 }
    }

    /// True when the failure came from the broker rather than the network.
    pub const fn is_broker_refusal(&self) -> bool {
        self.code > 0
    }
}

/// Telemetry could not be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The message would not fit in `TELEMETRY_MAX_LEN` bytes.
    Overflow,
}

// Convenience conversions

impl From<MqttError> for Error {
    fn from(e: MqttError) -> Self {
        Error::Mqtt(e)
    }
}

impl From<EncodeError> for Error {
    fn from(_: EncodeError) -> Self {
        Error::BufferOverflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_codes_are_positive() {
        let e = MqttError::broker(0x87);
        assert_eq!(e.code, 0x87);
        assert!(e.is_broker_refusal());
        assert!(!MqttError::CONNECT_FAILED.is_broker_refusal());
    }

    #[test]
    fn conversions_wrap_into_top_level_error() {
        assert_eq!(
            Error::from(MqttError::CONNECTION_LOST),
            Error::Mqtt(MqttError { code: -3 })
        );
        assert_eq!(Error::from(EncodeError::Overflow), Error::BufferOverflow);
    }
}
