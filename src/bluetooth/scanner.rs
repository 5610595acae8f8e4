/// BlueZ backed BLE transport
use futures_util::StreamExt;
use log::{debug, error, warn};
use tokio::time::{sleep, Duration};

use crate::bluetooth::{Advertisement, BleTransport};
use crate::error::TransportError;
use crate::transport::TransportFactory;

fn backend(context: &str, e: bluer::Error) -> TransportError {
    error!("{}: {}", context, e);
    TransportError::Backend(format!("{}: {}", context, e))
}

/// Opens a fresh BlueZ session on the default adapter.
#[derive(Debug, Clone, Default)]
pub struct BluerFactory;

impl TransportFactory for BluerFactory {
    type Transport = BluerTransport;

    async fn open(&mut self) -> Result<BluerTransport, TransportError> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| backend("Failed to create Bluetooth session", e))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| backend("Failed to get default Bluetooth adapter", e))?;
        adapter
            .set_powered(true)
            .await
            .map_err(|e| backend("Failed to power on adapter", e))?;

        // Low Energy only; a failing filter still leaves a usable scan.
        let filter = bluer::DiscoveryFilter {
            transport: bluer::DiscoveryTransport::Le,
            duplicate_data: false,
            ..Default::default()
        };
        if let Err(e) = adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        Ok(BluerTransport {
            _session: session,
            adapter,
            device: None,
        })
    }
}

pub struct BluerTransport {
    _session: bluer::Session,
    adapter: bluer::Adapter,
    device: Option<bluer::Device>,
}

impl BleTransport for BluerTransport {
    async fn scan(&mut self, duration: Duration) -> Result<Vec<Advertisement>, TransportError> {
        let discovery = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| backend("Failed to start device discovery", e))?;
        let discovery_handle = tokio::spawn(async move {
            let mut stream = discovery;
            while let Some(event) = stream.next().await {
                debug!("Discovery event: {:?}", event);
            }
        });
        sleep(duration).await;
        discovery_handle.abort();

        let addresses = self
            .adapter
            .device_addresses()
            .await
            .map_err(|e| backend("Failed to get device addresses", e))?;

        let mut seen = Vec::new();
        for addr in addresses {
            let device = match self.adapter.device(addr) {
                Ok(device) => device,
                Err(_) => continue,
            };
            match device.manufacturer_data().await {
                Ok(Some(records)) => {
                    for (company, payload) in records {
                        let mut manufacturer_data = company.to_le_bytes().to_vec();
                        manufacturer_data.extend_from_slice(&payload);
                        seen.push(Advertisement {
                            address: addr.to_string(),
                            manufacturer_data,
                        });
                    }
                }
                Ok(None) => debug!("No manufacturer data for {}", addr),
                Err(e) => debug!("Failed to get manufacturer data for {}: {}", addr, e),
            }
        }
        Ok(seen)
    }

    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let addr: bluer::Address = address
            .parse()
            .map_err(|e| TransportError::Backend(format!("invalid address {}: {}", address, e)))?;
        let device = self
            .adapter
            .device(addr)
            .map_err(|e| backend("Failed to look up device", e))?;
        if !device.is_connected().await.unwrap_or(false) {
            device
                .connect()
                .await
                .map_err(|e| backend("Failed to connect", e))?;
        }
        debug!("Connected to {}", address);
        self.device = Some(device);
        Ok(())
    }

    async fn read_characteristic(&mut self, uuid: &str) -> Result<Vec<u8>, TransportError> {
        let device = self.device.as_ref().ok_or(TransportError::NotConnected)?;
        let services = device
            .services()
            .await
            .map_err(|e| backend("Failed to list services", e))?;

        for service in services {
            let characteristics = match service.characteristics().await {
                Ok(characteristics) => characteristics,
                Err(e) => {
                    debug!("Failed to list characteristics: {}", e);
                    continue;
                }
            };
            for characteristic in characteristics {
                match characteristic.uuid().await {
                    Ok(found) if found.to_string().eq_ignore_ascii_case(uuid) => {
                        return characteristic
                            .read()
                            .await
                            .map_err(|e| backend("Failed to read characteristic", e));
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Failed to get characteristic uuid: {}", e),
                }
            }
        }
        Err(TransportError::CharacteristicNotFound(uuid.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        match self.device.take() {
            Some(device) => device
                .disconnect()
                .await
                .map_err(|e| backend("Failed to disconnect", e)),
            None => Ok(()),
        }
    }
}
