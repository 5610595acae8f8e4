/// BH1750 ambient light sensor register block
use crate::decode::{Decoder, RawFrame};
use crate::error::DecodeError;
use crate::models::LightReading;

/// Default I2C address of the BH1750 (ADDR pin low).
pub const BH1750_ADDRESS: u16 = 0x23;

/// One measurement at 1 lx resolution, sensor powers down afterwards.
pub const ONE_TIME_HIGH_RES_MODE_1: u8 = 0x20;

/// Counts per lux at the default measurement time.
const COUNTS_PER_LUX: f64 = 1.2;

#[derive(Debug, Clone, Copy, Default)]
pub struct LightDecoder;

/// Convert the two result bytes (high byte first) into lux, rounded to 0.1 lx.
pub fn counts_to_lux(block: [u8; 2]) -> f64 {
    let counts = u16::from_be_bytes(block);
    (f64::from(counts) / COUNTS_PER_LUX * 10.0).round() / 10.0
}

impl Decoder for LightDecoder {
    type Reading = LightReading;

    fn decode(&self, frame: &RawFrame) -> Result<LightReading, DecodeError> {
        let bytes = match frame {
            RawFrame::Bytes(bytes) => bytes,
            RawFrame::Lines(_) => return Err(DecodeError::UnexpectedFrame { expected: "binary" }),
        };
        let block: [u8; 2] = bytes.as_slice().try_into().map_err(|_| DecodeError::Length {
            expected: 2,
            actual: bytes.len(),
        })?;

        Ok(LightReading {
            illuminance: counts_to_lux(block),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_counts_to_lux() {
        assert_eq!(counts_to_lux([0x00, 0x00]), 0.0);
        assert_eq!(counts_to_lux([0x00, 0x78]), 100.0);
        // 0x0203 = 515 counts -> 429.1666 lx
        assert_eq!(counts_to_lux([0x02, 0x03]), 429.2);
    }

    #[test]
    fn wrong_block_length_is_a_frame_error() {
        assert_eq!(
            LightDecoder.decode(&RawFrame::Bytes(vec![0x01])),
            Err(DecodeError::Length {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn decodes_register_block() {
        let reading = LightDecoder.decode(&RawFrame::Bytes(vec![0x01, 0x2c])).unwrap();
        assert_eq!(reading.illuminance, 250.0);
    }
}
