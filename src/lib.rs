//! Acquisition daemon for the WROMY environmental sensors.
//!
//! One process drives one sensor: a Lambrecht thermo-hygro-barometer on a
//! serial line, a BH1750 light sensor on I2C, or an Airthings Wave radon
//! monitor over BLE. Every reading is written as one row to a UTC day file;
//! station events go to a yearly log file.

pub mod acquisition;
pub mod alarm;
pub mod bluetooth;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod gpio;
#[cfg(feature = "i2c")]
pub mod i2c;
pub mod journal;
pub mod models;
pub mod notify;
pub mod recovery;
#[cfg(feature = "serial")]
pub mod serial;
pub mod station;
pub mod threshold;
pub mod transport;
pub mod utils;
pub mod writer;

pub use acquisition::{Acquisition, CycleReport, LoopState};
pub use config::DaemonConfig;
pub use error::{AcquisitionError, ConfigError, DecodeError, TransportError};
pub use journal::Journal;
pub use models::{Measurement, SensorKind, StationIdentity};
