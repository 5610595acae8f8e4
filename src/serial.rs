//! Serial line transport for the Lambrecht sensor.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::error::TransportError;
use crate::transport::{LineSource, TransportFactory};

/// A silent line for this long counts as a broken link.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

const USB_SERIAL_PREFIX: &str = "ttyUSB";

/// First USB serial adapter under `/dev`, by name.
pub fn default_port() -> Option<PathBuf> {
    let mut ports: Vec<PathBuf> = std::fs::read_dir("/dev")
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(USB_SERIAL_PREFIX))
        .map(|entry| entry.path())
        .collect();
    ports.sort();
    ports.into_iter().next()
}

/// Opens the configured port, or the first USB serial adapter present at the
/// time of opening.
#[derive(Debug, Clone)]
pub struct SerialFactory {
    path: Option<PathBuf>,
    baud_rate: u32,
}

impl SerialFactory {
    pub fn new(path: Option<PathBuf>, baud_rate: u32) -> Self {
        Self {
            path,
            baud_rate,
        }
    }
}

impl TransportFactory for SerialFactory {
    type Transport = SerialLine;

    async fn open(&mut self) -> Result<SerialLine, TransportError> {
        let path = self
            .path
            .clone()
            .or_else(default_port)
            .ok_or_else(|| TransportError::Backend("no serial port found".to_string()))?;
        let name = path.to_string_lossy().into_owned();

        let port = serialport::new(name.as_str(), self.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Backend(format!("failed to open {}: {}", name, e)))?;
        info!("Opened {} at {} baud", name, self.baud_rate);

        Ok(SerialLine {
            name,
            reader: Some(BufReader::new(port)),
        })
    }
}

/// Newline terminated records from an open serial port.
pub struct SerialLine {
    name: String,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
}

impl LineSource for SerialLine {
    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut reader = self.reader.take().ok_or(TransportError::NotConnected)?;

        let (reader, result) = tokio::task::spawn_blocking(move || {
            let mut line = Vec::new();
            let result = reader.read_until(b'\n', &mut line).map(|n| (n, line));
            (reader, result)
        })
        .await
        .map_err(|e| TransportError::Backend(format!("serial reader task failed: {}", e)))?;
        self.reader = Some(reader);

        let (n, mut line) = result.map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout(READ_TIMEOUT),
            _ => TransportError::Io(e),
        })?;
        if n == 0 {
            debug!("{} reached end of stream", self.name);
            return Err(TransportError::Disconnected);
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(line)
    }
}
