//! Sensor specific halves of the acquisition cycle.
//!
//! A station knows how to get the next raw frame from its transport, which
//! decoder turns it into a reading, how the loop is paced, and what else has
//! to happen once a measurement is on disk. Everything else (rotation, fault
//! recovery, retries) is shared and lives in [`crate::acquisition`].

pub mod light;
pub mod radon;
pub mod thp;

pub use light::LightStation;
pub use radon::RadonStation;
pub use thp::ThpStation;

use std::io;
use std::time::Duration;

use crate::decode::{Decoder, RawFrame};
use crate::error::TransportError;
use crate::journal::Journal;
use crate::models::{Measurement, SensorKind};

/// Reading type produced by station `S`.
pub type ReadingOf<S> = <<S as Station>::Decoder as Decoder>::Reading;

#[allow(async_fn_in_trait)]
pub trait Station {
    type Decoder: Decoder;

    fn kind(&self) -> SensorKind;

    fn decoder(&self) -> &Self::Decoder;

    /// One attempt at reading the next raw frame, connecting first if needed.
    async fn acquire(&mut self) -> Result<RawFrame, TransportError>;

    /// Forget the current transport after a failure. The next
    /// [`acquire`](Station::acquire) starts from a freshly opened one.
    fn drop_transport(&mut self);

    /// Pause between cycles, or `None` when frame arrival paces the loop.
    fn sample_period(&self) -> Option<Duration>;

    /// Station specific follow-up once `measurement` has been written.
    async fn after_record(
        &mut self,
        _measurement: &Measurement<ReadingOf<Self>>,
        _journal: &mut Journal,
    ) -> io::Result<()> {
        Ok(())
    }
}
