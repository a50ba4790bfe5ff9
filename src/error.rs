//! Error taxonomy shared by every component of the logger.
//!
//! Per-channel failures (`InvalidChannel`, `Communication`, `OutOfRange`) are
//! recoverable and get contained to the channel that produced them.
//! `HardwareUnavailable` only ever appears at startup and selects the
//! synthetic source for the rest of the run. `GpioUnavailable` is a startup
//! failure to claim the button lines; `Gpio` ends the button task.

use std::io;
use std::path::PathBuf;

/// Result type alias using [`ThermoError`]
pub type Result<T> = std::result::Result<T, ThermoError>;

#[derive(thiserror::Error, Debug)]
pub enum ThermoError {
    #[error("Invalid channel {channel} (must be 1..=8)")]
    InvalidChannel { channel: u8 },

    #[error("Invalid stack level {stack} (must be 0..=7)")]
    InvalidStack { stack: u8 },

    #[error("Board reported unknown sensor type code {code}")]
    InvalidSensorCode { code: u8 },

    #[error("Bus communication failed during {operation}: {source}")]
    Communication {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Voltage {microvolts} uV outside K-type range [-5891, 54886] uV")]
    OutOfRange { microvolts: f64 },

    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("GPIO unavailable: {0}")]
    GpioUnavailable(String),

    #[error("Button line {line} read failed: {reason}")]
    Gpio { line: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{task} task did not stop within {timeout_ms} ms")]
    StopTimeout { task: &'static str, timeout_ms: u64 },

    #[error("{task} task aborted: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}

impl ThermoError {
    pub(crate) fn comm(operation: &'static str, source: io::Error) -> Self {
        ThermoError::Communication { operation, source }
    }

    /// Whether the error is confined to one channel for one tick.
    pub fn is_channel_local(&self) -> bool {
        matches!(
            self,
            ThermoError::InvalidChannel { .. }
                | ThermoError::Communication { .. }
                | ThermoError::OutOfRange { .. }
                | ThermoError::InvalidSensorCode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_error_keeps_cause() {
        let err = ThermoError::comm("read temperature", io::Error::new(io::ErrorKind::Other, "nack"));
        assert!(err.to_string().contains("read temperature"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_channel_local());
    }

    #[test]
    fn test_startup_errors_are_not_channel_local() {
        assert!(!ThermoError::HardwareUnavailable("no bus".into()).is_channel_local());
        assert!(!ThermoError::StopTimeout { task: "acquisition", timeout_ms: 1000 }.is_channel_local());
    }
}
