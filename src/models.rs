use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

use crate::utils::{format_date, format_time, seconds_of_day};

/// Written in place of a field that could not be read this cycle.
pub const MISSING_VALUE: f64 = -9999.0;

/// Reported by the Lambrecht THP sensor when it needs a power cycle.
pub const FAULT_VALUE: f64 = 999.9;

/// Numeric station id, derived once from the host name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationIdentity {
    pub id: u16,
}

impl StationIdentity {
    pub fn new(id: u16) -> Self {
        Self { id }
    }

    /// Parse hosts named like `raspberrypi-wromy-3`: the station number is the
    /// last `-` separated token.
    pub fn from_hostname(hostname: &str) -> Option<Self> {
        hostname
            .trim()
            .rsplit('-')
            .next()
            .and_then(|token| token.parse().ok())
            .map(Self::new)
    }
}

impl fmt::Display for StationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.id)
    }
}

/// The three sensor variants the daemon can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Lambrecht thermo-hygro-barometer on a serial line.
    Thp,
    /// BH1750 light sensor on the I2C bus.
    Light,
    /// Airthings Wave radon monitor over BLE.
    Radon,
}

impl SensorKind {
    /// Stream name used in directory, data file and log file names.
    pub fn stream_name(&self, station: StationIdentity) -> String {
        match self {
            SensorKind::Thp => format!("WS{}", station.id),
            SensorKind::Light => format!("LX{}", station.id),
            SensorKind::Radon => "RDN".to_string(),
        }
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thp" | "lambrecht" => Ok(SensorKind::Thp),
            "light" | "bh1750" => Ok(SensorKind::Light),
            "radon" | "wave" => Ok(SensorKind::Radon),
            other => Err(format!("unknown sensor kind '{}'", other)),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Thp => "thp",
            SensorKind::Light => "light",
            SensorKind::Radon => "radon",
        };
        f.write_str(name)
    }
}

/// A sensor value that asks for a hardware reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fault {
    pub field: &'static str,
    pub value: f64,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Error occurred in {}", self.value, self.field)
    }
}

/// Decoded values of one sampling cycle, before they are timestamped.
pub trait Reading: Clone + fmt::Debug {
    /// Header row of the day files for this stream.
    const HEADER: &'static [&'static str];

    /// A reading with every field set to `missing`.
    fn missing(missing: f64) -> Self;

    /// Data row for this reading taken at `at`.
    fn row(&self, at: OffsetDateTime) -> Vec<String>;

    /// A value that calls for hardware recovery, if any.
    fn fault(&self) -> Option<Fault> {
        None
    }
}

/// A timestamped reading. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<R> {
    pub taken_at: OffsetDateTime,
    pub reading: R,
}

impl<R: Reading> Measurement<R> {
    pub fn new(taken_at: OffsetDateTime, reading: R) -> Self {
        Self { taken_at, reading }
    }

    pub fn row(&self) -> Vec<String> {
        self.reading.row(self.taken_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThpReading {
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl Reading for ThpReading {
    const HEADER: &'static [&'static str] = &[
        "Seconds",
        "Date",
        "Time (UTC)",
        "Temperature (°C)",
        "Pressure (hPa)",
        "rel. Humidity (%)",
    ];

    fn missing(missing: f64) -> Self {
        Self {
            temperature: missing,
            pressure: missing,
            humidity: missing,
        }
    }

    fn row(&self, at: OffsetDateTime) -> Vec<String> {
        vec![
            seconds_of_day(&at).to_string(),
            format_date(&at),
            format_time(&at),
            self.temperature.to_string(),
            self.pressure.to_string(),
            self.humidity.to_string(),
        ]
    }

    fn fault(&self) -> Option<Fault> {
        [
            ("temperature", self.temperature),
            ("pressure", self.pressure),
            ("humidity", self.humidity),
        ]
        .into_iter()
        .find(|(_, value)| *value == FAULT_VALUE)
        .map(|(field, value)| Fault { field, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightReading {
    /// Illuminance in lux, rounded to 0.1 lx.
    pub illuminance: f64,
}

impl Reading for LightReading {
    const HEADER: &'static [&'static str] = &["Date", "Time (UTC)", "Illuminance (lx)"];

    fn missing(missing: f64) -> Self {
        Self {
            illuminance: missing,
        }
    }

    fn row(&self, at: OffsetDateTime) -> Vec<String> {
        vec![
            format_date(&at),
            format_time(&at),
            self.illuminance.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadonReading {
    pub humidity: f64,
    pub radon_short_term: f64,
    pub radon_long_term: f64,
    pub temperature: f64,
}

impl Reading for RadonReading {
    const HEADER: &'static [&'static str] = &[
        "Date",
        "Time (UTC)",
        "Humidity (%rH)",
        "Radon ST avg (Bq/m3)",
        "Radon LT avg (Bq/m3)",
        "Temperature (degC)",
    ];

    fn missing(missing: f64) -> Self {
        Self {
            humidity: missing,
            radon_short_term: missing,
            radon_long_term: missing,
            temperature: missing,
        }
    }

    fn row(&self, at: OffsetDateTime) -> Vec<String> {
        vec![
            format_date(&at),
            format_time(&at),
            self.humidity.to_string(),
            self.radon_short_term.to_string(),
            self.radon_long_term.to_string(),
            self.temperature.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn station_id_comes_from_last_hostname_token() {
        assert_eq!(
            StationIdentity::from_hostname("raspberrypi-wromy-3\n"),
            Some(StationIdentity::new(3))
        );
        assert_eq!(
            StationIdentity::from_hostname("wromy-12"),
            Some(StationIdentity::new(12))
        );
        assert_eq!(StationIdentity::from_hostname("laptop"), None);
    }

    #[test]
    fn stream_names_encode_station() {
        let station = StationIdentity::new(5);
        assert_eq!(SensorKind::Thp.stream_name(station), "WS5");
        assert_eq!(SensorKind::Light.stream_name(station), "LX5");
        assert_eq!(SensorKind::Radon.stream_name(station), "RDN");
    }

    #[test]
    fn thp_row_starts_with_seconds_of_day() {
        let reading = ThpReading {
            temperature: 21.3,
            pressure: 1013.2,
            humidity: MISSING_VALUE,
        };
        let row = Measurement::new(datetime!(2024-03-05 01:02:03 UTC), reading).row();
        assert_eq!(
            row,
            vec!["3723", "20240305", "010203", "21.3", "1013.2", "-9999"]
        );
    }

    #[test]
    fn fault_is_reported_for_any_monitored_field() {
        let mut reading = ThpReading::missing(MISSING_VALUE);
        assert_eq!(reading.fault(), None);

        reading.pressure = FAULT_VALUE;
        assert_eq!(
            reading.fault(),
            Some(Fault {
                field: "pressure",
                value: FAULT_VALUE
            })
        );
    }
}
