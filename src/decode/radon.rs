/// Airthings Wave radon monitor characteristic and advertisement decoding
use log::warn;

use crate::decode::{Decoder, RawFrame};
use crate::error::DecodeError;
use crate::models::{RadonReading, MISSING_VALUE};

/// Airthings company identifier leading the manufacturer data.
pub const AIRTHINGS_MANUFACTURER_ID: u16 = 0x0334;

/// Characteristic holding the current sensor values.
pub const CURRENT_VALUES_UUID: &str = "b42e4dcc-ade7-11e4-89d3-123b93f75cba";

/// Only sensor layout this decoder understands.
const SENSOR_VERSION: u8 = 1;

/// `<BBBBHHHHHHHH`: four bytes followed by eight little-endian u16 values.
const PAYLOAD_LEN: usize = 20;

/// Largest radon count the sensor reports as a valid measurement.
const RADON_MAX: u16 = 16383;

/// Extract the device serial number from raw manufacturer data.
///
/// The first two bytes are the company identifier (little-endian) and must
/// match Airthings; the next four carry the serial number. Anything else is
/// an unknown device.
pub fn parse_serial_number(manufacturer_data: &[u8]) -> Option<u32> {
    if manufacturer_data.len() < 6 {
        return None;
    }
    let company = u16::from_le_bytes([manufacturer_data[0], manufacturer_data[1]]);
    if company != AIRTHINGS_MANUFACTURER_ID {
        return None;
    }
    Some(u32::from_le_bytes([
        manufacturer_data[2],
        manufacturer_data[3],
        manufacturer_data[4],
        manufacturer_data[5],
    ]))
}

/// Decode the current-values characteristic of a Wave (version 1 layout)
///
/// - Byte 0: sensor version, must be 1
/// - Byte 1: humidity, 0.5 %rH resolution
/// - Bytes 4-5: radon short-term average, Bq/m3
/// - Bytes 6-7: radon long-term average, Bq/m3
/// - Bytes 8-9: temperature, 0.01 degC resolution
///
/// Radon values above 16383 mean "not available yet" and are written as
/// missing.
#[derive(Debug, Clone, Copy)]
pub struct RadonDecoder {
    missing: f64,
}

impl RadonDecoder {
    pub fn new(missing: f64) -> Self {
        Self { missing }
    }

    fn radon(&self, raw: u16) -> f64 {
        if raw <= RADON_MAX {
            f64::from(raw)
        } else {
            self.missing
        }
    }
}

impl Default for RadonDecoder {
    fn default() -> Self {
        Self::new(MISSING_VALUE)
    }
}

impl Decoder for RadonDecoder {
    type Reading = RadonReading;

    fn decode(&self, frame: &RawFrame) -> Result<RadonReading, DecodeError> {
        let data = match frame {
            RawFrame::Bytes(bytes) => bytes,
            RawFrame::Lines(_) => return Err(DecodeError::UnexpectedFrame { expected: "binary" }),
        };
        if data.len() != PAYLOAD_LEN {
            if let Some(version) = data.first() {
                warn!("Invalid Wave payload: len={}, version={}", data.len(), version);
            }
            return Err(DecodeError::Length {
                expected: PAYLOAD_LEN,
                actual: data.len(),
            });
        }
        if data[0] != SENSOR_VERSION {
            return Err(DecodeError::UnsupportedVersion(data[0]));
        }

        let word = |offset: usize| u16::from_le_bytes([data[offset], data[offset + 1]]);

        Ok(RadonReading {
            humidity: f64::from(data[1]) / 2.0,
            radon_short_term: self.radon(word(4)),
            radon_long_term: self.radon(word(6)),
            temperature: f64::from(word(8)) / 100.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(version: u8, humidity: u8, short: u16, long: u16, temperature: u16) -> Vec<u8> {
        let mut data = vec![version, humidity, 0, 0];
        for word in [short, long, temperature, 0, 0, 0, 0, 0] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data
    }

    #[test]
    fn decodes_version_one_payload() {
        let reading = RadonDecoder::default()
            .decode(&RawFrame::Bytes(payload(1, 91, 57, 43, 2137)))
            .unwrap();
        assert_eq!(
            reading,
            RadonReading {
                humidity: 45.5,
                radon_short_term: 57.0,
                radon_long_term: 43.0,
                temperature: 21.37
            }
        );
    }

    #[test]
    fn out_of_range_radon_is_missing() {
        let reading = RadonDecoder::default()
            .decode(&RawFrame::Bytes(payload(1, 80, 0xffff, 120, 2000)))
            .unwrap();
        assert_eq!(reading.radon_short_term, MISSING_VALUE);
        assert_eq!(reading.radon_long_term, 120.0);
    }

    #[test]
    fn unknown_version_is_a_frame_error() {
        assert_eq!(
            RadonDecoder::default().decode(&RawFrame::Bytes(payload(2, 80, 1, 1, 1))),
            Err(DecodeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn short_payload_is_a_frame_error() {
        assert_eq!(
            RadonDecoder::default().decode(&RawFrame::Bytes(vec![1, 2, 3])),
            Err(DecodeError::Length {
                expected: 20,
                actual: 3
            })
        );
    }

    #[test]
    fn serial_number_requires_airthings_signature() {
        let serial: u32 = 2_950_040_221;
        let mut data = AIRTHINGS_MANUFACTURER_ID.to_le_bytes().to_vec();
        data.extend_from_slice(&serial.to_le_bytes());
        data.extend_from_slice(&[0x09, 0x00]);
        assert_eq!(parse_serial_number(&data), Some(serial));

        data[0] = 0x99;
        assert_eq!(parse_serial_number(&data), None);
        assert_eq!(parse_serial_number(&[0x34, 0x03, 0x01]), None);
    }
}
