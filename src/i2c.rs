//! I2C transport for the BH1750 light sensor.

use std::time::Duration;

use log::{debug, info};
use rppal::i2c::I2c;
use tokio::time::sleep;

use crate::error::TransportError;
use crate::transport::{RegisterBus, TransportFactory};

/// Worst case conversion time of a one-time high resolution measurement.
const CONVERSION_TIME: Duration = Duration::from_millis(180);

fn backend(context: &str, e: rppal::i2c::Error) -> TransportError {
    match e {
        rppal::i2c::Error::Io(e) => TransportError::Io(e),
        other => TransportError::Backend(format!("{}: {}", context, other)),
    }
}

/// Opens `/dev/i2c-{bus}`.
#[derive(Debug, Clone)]
pub struct I2cFactory {
    bus: u8,
}

impl I2cFactory {
    pub fn new(bus: u8) -> Self {
        Self { bus }
    }
}

impl TransportFactory for I2cFactory {
    type Transport = I2cBus;

    async fn open(&mut self) -> Result<I2cBus, TransportError> {
        let i2c = I2c::with_bus(self.bus).map_err(|e| backend("Failed to open I2C bus", e))?;
        info!("Opened I2C bus {}", self.bus);
        Ok(I2cBus {
            i2c,
            selected: None,
        })
    }
}

/// An open I2C bus.
pub struct I2cBus {
    i2c: I2c,
    selected: Option<u16>,
}

impl I2cBus {
    fn select(&mut self, address: u16) -> Result<(), TransportError> {
        if self.selected == Some(address) {
            return Ok(());
        }
        self.i2c
            .set_slave_address(address)
            .map_err(|e| backend("Failed to select device", e))?;
        debug!("Selected I2C device {:#04x}", address);
        self.selected = Some(address);
        Ok(())
    }
}

impl RegisterBus for I2cBus {
    async fn read_block(&mut self, address: u16, command: u8) -> Result<[u8; 2], TransportError> {
        self.select(address)?;
        self.i2c
            .write(&[command])
            .map_err(|e| backend("Failed to send measurement command", e))?;
        sleep(CONVERSION_TIME).await;

        let mut block = [0u8; 2];
        let read = self
            .i2c
            .read(&mut block)
            .map_err(|e| backend("Failed to read measurement", e))?;
        if read != block.len() {
            return Err(TransportError::Backend(format!(
                "short read from {:#04x}: {} of {} bytes",
                address,
                read,
                block.len()
            )));
        }
        Ok(block)
    }
}
