/// Lambrecht thermo-hygro-barometer NMEA records
use crate::decode::{Decoder, RawFrame};
use crate::error::DecodeError;
use crate::models::{ThpReading, MISSING_VALUE};

const TEMPERATURE_TAG: &str = "$WIMTA";
const HUMIDITY_TAG: &str = "$WIMHU";
const PRESSURE_TAG: &str = "$WIMMB";

// Comma separated field holding the value, counted from the tag.
const TEMPERATURE_FIELD: usize = 1;
const HUMIDITY_FIELD: usize = 1;
const PRESSURE_FIELD: usize = 3;

/// One record of a Lambrecht transmission.
///
/// Values that are present but do not parse carry the missing-value sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThpRecord {
    Temperature(f64),
    Humidity(f64),
    Pressure(f64),
    Unknown,
}

impl ThpRecord {
    pub fn parse(line: &str, missing: f64) -> Self {
        let tag = line.split(',').next().unwrap_or_default().trim();
        let (tag, body) = match tag {
            TEMPERATURE_TAG | HUMIDITY_TAG | PRESSURE_TAG => (tag, line.trim()),
            // Noise in front of the tag: cut the record at the first known tag.
            _ => match [TEMPERATURE_TAG, HUMIDITY_TAG, PRESSURE_TAG]
                .into_iter()
                .filter_map(|tag| line.find(tag).map(|at| (at, tag)))
                .min()
            {
                Some((at, tag)) => (tag, line[at..].trim()),
                None => return ThpRecord::Unknown,
            },
        };

        let field = |index: usize| {
            body.split(',')
                .nth(index)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .unwrap_or(missing)
        };

        match tag {
            TEMPERATURE_TAG => ThpRecord::Temperature(field(TEMPERATURE_FIELD)),
            HUMIDITY_TAG => ThpRecord::Humidity(field(HUMIDITY_FIELD)),
            _ => ThpRecord::Pressure(field(PRESSURE_FIELD)),
        }
    }
}

/// Decodes the three-line frame `$WIMTA`, `$WIMHU`, `$WIMMB`.
///
/// Each position must carry its own tag; a record found at the wrong
/// position, or not recognized at all, leaves that field missing.
#[derive(Debug, Clone, Copy)]
pub struct ThpDecoder {
    missing: f64,
}

impl ThpDecoder {
    pub fn new(missing: f64) -> Self {
        Self { missing }
    }
}

impl Default for ThpDecoder {
    fn default() -> Self {
        Self::new(MISSING_VALUE)
    }
}

impl Decoder for ThpDecoder {
    type Reading = ThpReading;

    fn decode(&self, frame: &RawFrame) -> Result<ThpReading, DecodeError> {
        let lines = match frame {
            RawFrame::Lines(lines) => lines,
            RawFrame::Bytes(_) => return Err(DecodeError::UnexpectedFrame { expected: "text" }),
        };
        let record = |position: usize| {
            lines
                .get(position)
                .map(|line| ThpRecord::parse(line, self.missing))
                .unwrap_or(ThpRecord::Unknown)
        };

        let temperature = match record(0) {
            ThpRecord::Temperature(value) => value,
            _ => self.missing,
        };
        let humidity = match record(1) {
            ThpRecord::Humidity(value) => value,
            _ => self.missing,
        };
        let pressure = match record(2) {
            ThpRecord::Pressure(value) => value,
            _ => self.missing,
        };

        Ok(ThpReading {
            temperature,
            pressure,
            humidity,
        })
    }
}
