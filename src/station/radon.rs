use std::io;
use std::time::Duration;

use log::{debug, info};

use crate::alarm::RadonAlarm;
use crate::bluetooth::{find_device, BleTransport, SCAN_ROUNDS, SCAN_WINDOW};
use crate::decode::radon::CURRENT_VALUES_UUID;
use crate::decode::{RadonDecoder, RawFrame};
use crate::error::TransportError;
use crate::journal::Journal;
use crate::models::{Measurement, RadonReading, SensorKind};
use crate::station::Station;
use crate::transport::TransportFactory;

/// Airthings Wave radon monitor, read over BLE once per sample period.
///
/// Each cycle opens a new BLE transport, connects, reads the current values
/// and disconnects again. The device address is discovered from its serial
/// number and cached until a transport failure.
pub struct RadonStation<F: TransportFactory> {
    factory: F,
    serial: u32,
    address: Option<String>,
    decoder: RadonDecoder,
    period: Duration,
    scan_window: Duration,
    alarm: Option<RadonAlarm>,
    missing: f64,
}

impl<F> RadonStation<F>
where
    F: TransportFactory,
    F::Transport: BleTransport,
{
    pub fn new(factory: F, serial: u32, decoder: RadonDecoder, period: Duration) -> Self {
        Self {
            factory,
            serial,
            address: None,
            decoder,
            period,
            scan_window: SCAN_WINDOW,
            alarm: None,
            missing: crate::models::MISSING_VALUE,
        }
    }

    pub fn with_alarm(mut self, alarm: RadonAlarm) -> Self {
        self.alarm = Some(alarm);
        self
    }

    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Short-term averages equal to `missing` never sound the alarm.
    pub fn with_missing_value(mut self, missing: f64) -> Self {
        self.missing = missing;
        self
    }

    async fn read_current_values(
        ble: &mut F::Transport,
        address: &str,
    ) -> Result<Vec<u8>, TransportError> {
        ble.connect(address).await?;
        ble.read_characteristic(CURRENT_VALUES_UUID).await
    }
}

impl<F> Station for RadonStation<F>
where
    F: TransportFactory,
    F::Transport: BleTransport,
{
    type Decoder = RadonDecoder;

    fn kind(&self) -> SensorKind {
        SensorKind::Radon
    }

    fn decoder(&self) -> &RadonDecoder {
        &self.decoder
    }

    async fn acquire(&mut self) -> Result<RawFrame, TransportError> {
        let mut ble = self.factory.open().await?;

        let address = match &self.address {
            Some(address) => address.clone(),
            None => {
                let address =
                    find_device(&mut ble, self.serial, SCAN_ROUNDS, self.scan_window).await?;
                info!("Wave {} found at {}", self.serial, address);
                self.address = Some(address.clone());
                address
            }
        };

        let result = Self::read_current_values(&mut ble, &address).await;
        if let Err(e) = ble.disconnect().await {
            debug!("Disconnect from {} failed: {}", address, e);
        }
        result.map(RawFrame::Bytes)
    }

    fn drop_transport(&mut self) {
        self.address = None;
    }

    fn sample_period(&self) -> Option<Duration> {
        Some(self.period)
    }

    async fn after_record(
        &mut self,
        measurement: &Measurement<RadonReading>,
        _journal: &mut Journal,
    ) -> io::Result<()> {
        let radon = measurement.reading.radon_short_term;
        if radon == self.missing {
            return Ok(());
        }
        if let Some(alarm) = self.alarm.as_mut() {
            alarm.check(radon).await;
        }
        Ok(())
    }
}
