//! Bluetooth Low Energy transport capability and device discovery.

#[cfg(feature = "bluetooth")]
pub mod scanner;

use std::time::Duration;

use log::debug;

use crate::decode::parse_serial_number;
use crate::error::TransportError;

/// Short scans per discovery before the device counts as absent.
pub const SCAN_ROUNDS: u32 = 50;
/// Length of one discovery scan.
pub const SCAN_WINDOW: Duration = Duration::from_millis(100);

/// One manufacturer data record seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    /// Company identifier (little-endian) followed by the payload.
    pub manufacturer_data: Vec<u8>,
}

#[allow(async_fn_in_trait)]
pub trait BleTransport {
    async fn scan(&mut self, duration: Duration) -> Result<Vec<Advertisement>, TransportError>;

    async fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    async fn read_characteristic(&mut self, uuid: &str) -> Result<Vec<u8>, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Scan until a device advertising `serial` shows up and return its address.
///
/// Devices of other vendors, or without manufacturer data, are skipped.
pub async fn find_device<B: BleTransport>(
    ble: &mut B,
    serial: u32,
    rounds: u32,
    window: Duration,
) -> Result<String, TransportError> {
    for round in 0..rounds {
        let seen = ble.scan(window).await?;
        if let Some(found) = seen
            .iter()
            .find(|adv| parse_serial_number(&adv.manufacturer_data) == Some(serial))
        {
            debug!("Found device {} after {} scan(s)", found.address, round + 1);
            return Ok(found.address.clone());
        }
    }
    Err(TransportError::DeviceNotFound(serial))
}
