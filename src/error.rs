//! Error types shared by the acquisition loop and its collaborators.
//!
//! The taxonomy follows how each failure is handled:
//!
//! - [`DecodeError`] invalidates one frame. The cycle still writes a row with
//!   every field set to the missing-value sentinel.
//! - [`TransportError`] means the sensor link is broken. The loop discards the
//!   transport and reconnects with bounded retries.
//! - [`AcquisitionError`] ends the run. The process exits non-zero and the
//!   supervisor restarts it.

use thiserror::Error;

/// Failure of a sensor transport (serial line, I2C bus, BLE peripheral).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport disconnected")]
    Disconnected,

    #[error("no data within {0:?}")]
    Timeout(std::time::Duration),

    #[error("no device advertising serial number {0}")]
    DeviceNotFound(u32),

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(String),

    #[error("not connected to a device")]
    NotConnected,

    #[error("{0}")]
    Backend(String),
}

/// A frame that cannot be turned into a measurement at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected a {expected} frame")]
    UnexpectedFrame { expected: &'static str },

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("unsupported sensor version {0}")]
    UnsupportedVersion(u8),
}

/// Settings that cannot be loaded or do not make sense together.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("cannot derive station id from hostname '{0}'; set WROMY_STATION_ID")]
    NoStationId(String),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Errors that terminate the sampling run.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("transport failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}
