use std::io;
use std::time::Duration;

use log::info;

use crate::decode::light::{LightDecoder, BH1750_ADDRESS, ONE_TIME_HIGH_RES_MODE_1};
use crate::decode::RawFrame;
use crate::error::TransportError;
use crate::journal::Journal;
use crate::models::{LightReading, Measurement, SensorKind, StationIdentity, MISSING_VALUE};
use crate::station::Station;
use crate::threshold::{StatusTracker, ThresholdPolicy};
use crate::transport::{RegisterBus, TransportFactory};

/// BH1750 light sensor watching a lid, polled at a fixed period.
///
/// Every reading goes to the day file; lid open/close transitions go to the
/// yearly log as end/start pairs.
pub struct LightStation<F: TransportFactory> {
    factory: F,
    bus: Option<F::Transport>,
    address: u16,
    decoder: LightDecoder,
    tracker: StatusTracker,
    label: String,
    period: Duration,
    missing: f64,
}

impl<F> LightStation<F>
where
    F: TransportFactory,
    F::Transport: RegisterBus,
{
    pub fn new(
        factory: F,
        station: StationIdentity,
        window_capacity: usize,
        policy: ThresholdPolicy,
        period: Duration,
    ) -> Self {
        Self {
            factory,
            bus: None,
            address: BH1750_ADDRESS,
            decoder: LightDecoder,
            tracker: StatusTracker::new(window_capacity, policy),
            label: format!("WS{}", station.id),
            period,
            missing: MISSING_VALUE,
        }
    }

    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }

    /// Readings equal to `missing` are written but never enter the window.
    pub fn with_missing_value(mut self, missing: f64) -> Self {
        self.missing = missing;
        self
    }
}

impl<F> Station for LightStation<F>
where
    F: TransportFactory,
    F::Transport: RegisterBus,
{
    type Decoder = LightDecoder;

    fn kind(&self) -> SensorKind {
        SensorKind::Light
    }

    fn decoder(&self) -> &LightDecoder {
        &self.decoder
    }

    async fn acquire(&mut self) -> Result<RawFrame, TransportError> {
        if self.bus.is_none() {
            self.bus = Some(self.factory.open().await?);
            info!("I2C bus opened for device {:#04x}", self.address);
        }
        let bus = self.bus.as_mut().ok_or(TransportError::NotConnected)?;
        let block = bus.read_block(self.address, ONE_TIME_HIGH_RES_MODE_1).await?;
        Ok(RawFrame::Bytes(block.to_vec()))
    }

    fn drop_transport(&mut self) {
        self.bus = None;
    }

    fn sample_period(&self) -> Option<Duration> {
        Some(self.period)
    }

    async fn after_record(
        &mut self,
        measurement: &Measurement<LightReading>,
        journal: &mut Journal,
    ) -> io::Result<()> {
        let value = measurement.reading.illuminance;
        if value == self.missing {
            return Ok(());
        }

        if let Some(transition) = self.tracker.update(value, measurement.taken_at) {
            info!("Lid status changed: {} -> {}", transition.from, transition.to);
            for row in transition.log_rows(&self.label) {
                journal.log_row(&transition.at, &row)?;
            }
        }
        Ok(())
    }
}
