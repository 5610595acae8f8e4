//! Raw frame to typed reading conversion.
//!
//! Field level problems (a missing tag, a value that does not parse, a radon
//! count out of range) become the missing-value sentinel and decoding goes on.
//! Only a frame that cannot be interpreted at all is a [`DecodeError`].

pub mod light;
pub mod radon;
pub mod thp;

pub use light::LightDecoder;
pub use radon::{parse_serial_number, RadonDecoder};
pub use thp::{ThpDecoder, ThpRecord};

use crate::error::DecodeError;
use crate::models::Reading;

/// One multiplexed transmission, discarded once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// Text records of a serial transmission.
    Lines(Vec<String>),
    /// Register block or BLE characteristic payload.
    Bytes(Vec<u8>),
}

pub trait Decoder {
    type Reading: Reading;

    fn decode(&self, frame: &RawFrame) -> Result<Self::Reading, DecodeError>;
}
