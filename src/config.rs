use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};

use crate::decode::light::BH1750_ADDRESS;
use crate::error::ConfigError;
use crate::models::{SensorKind, StationIdentity, MISSING_VALUE};
use crate::recovery::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::threshold::DEFAULT_WINDOW_CAPACITY;

pub const DEFAULT_DATA_DIR: &str = "/home/pi/WROMY/data";
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_BAUD_RATE: u32 = 4800;
pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_RESET_PIN: u8 = 23;

/// Highest BCM line routed to the 40-pin header.
const MAX_HEADER_PIN: u8 = 27;

/// Runtime settings of one acquisition daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub sensor: SensorKind,
    pub station: StationIdentity,
    pub data_dir: PathBuf,
    pub sample_period: Duration,
    pub window_capacity: usize,
    pub light_threshold: Option<f64>,
    pub missing_value: f64,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub serial_port: Option<PathBuf>,
    pub baud_rate: u32,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    /// BCM number of the reset relay line.
    pub reset_pin: u8,
    /// BCM number of the radon buzzer line.
    pub buzzer_pin: Option<u8>,
    pub radon_serial: Option<u32>,
    pub notify_recipient: Option<String>,
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

/// `0x23` or `35`.
fn parse_address(key: &'static str, value: String) -> Result<u16, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    };
    parsed.ok_or(ConfigError::Invalid { key, value })
}

impl DaemonConfig {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup and validate the result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty());
        let opt = |key: &'static str| -> Result<Option<u32>, ConfigError> {
            var(key).map(|value| parse(key, value)).transpose()
        };

        let sensor_raw = var("WROMY_SENSOR").ok_or(ConfigError::Missing("WROMY_SENSOR"))?;
        let sensor: SensorKind = sensor_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "WROMY_SENSOR",
            value: sensor_raw.clone(),
        })?;

        let station = match var("WROMY_STATION_ID") {
            Some(value) => StationIdentity::new(parse("WROMY_STATION_ID", value)?),
            None => station_from_hostname()?,
        };

        let config = DaemonConfig {
            sensor,
            station,
            data_dir: var("WROMY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            sample_period: opt("WROMY_SAMPLE_PERIOD_SECS")?
                .map(|secs| Duration::from_secs(u64::from(secs)))
                .unwrap_or(DEFAULT_SAMPLE_PERIOD),
            window_capacity: var("WROMY_WINDOW_CAPACITY")
                .map(|value| parse("WROMY_WINDOW_CAPACITY", value))
                .transpose()?
                .unwrap_or(DEFAULT_WINDOW_CAPACITY),
            light_threshold: var("WROMY_LIGHT_THRESHOLD")
                .map(|value| parse("WROMY_LIGHT_THRESHOLD", value))
                .transpose()?,
            missing_value: var("WROMY_MISSING_VALUE")
                .map(|value| parse("WROMY_MISSING_VALUE", value))
                .transpose()?
                .unwrap_or(MISSING_VALUE),
            max_attempts: opt("WROMY_MAX_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_delay: opt("WROMY_RETRY_DELAY_SECS")?
                .map(|secs| Duration::from_secs(u64::from(secs)))
                .unwrap_or(DEFAULT_RETRY_DELAY),
            serial_port: var("WROMY_SERIAL_PORT").map(PathBuf::from),
            baud_rate: opt("WROMY_BAUD_RATE")?.unwrap_or(DEFAULT_BAUD_RATE),
            i2c_bus: var("WROMY_I2C_BUS")
                .map(|value| parse("WROMY_I2C_BUS", value))
                .transpose()?
                .unwrap_or(DEFAULT_I2C_BUS),
            i2c_address: var("WROMY_I2C_ADDRESS")
                .map(|value| parse_address("WROMY_I2C_ADDRESS", value))
                .transpose()?
                .unwrap_or(BH1750_ADDRESS),
            reset_pin: var("WROMY_RESET_PIN")
                .map(|value| parse("WROMY_RESET_PIN", value))
                .transpose()?
                .unwrap_or(DEFAULT_RESET_PIN),
            buzzer_pin: var("WROMY_BUZZER_PIN")
                .map(|value| parse("WROMY_BUZZER_PIN", value))
                .transpose()?,
            radon_serial: opt("WROMY_RADON_SERIAL")?,
            notify_recipient: var("WROMY_NOTIFY_RECIPIENT").map(|value| value.trim().to_string()),
        };

        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::Validation(
                "window capacity must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if !self.missing_value.is_finite() {
            return Err(ConfigError::Validation(
                "missing value must be a finite number".to_string(),
            ));
        }
        for (key, pin) in [
            ("WROMY_RESET_PIN", Some(self.reset_pin)),
            ("WROMY_BUZZER_PIN", self.buzzer_pin),
        ] {
            if let Some(pin) = pin.filter(|pin| *pin > MAX_HEADER_PIN) {
                return Err(ConfigError::Validation(format!(
                    "{} must be a BCM line number 0-{}, got {}",
                    key, MAX_HEADER_PIN, pin
                )));
            }
        }
        match self.sensor {
            SensorKind::Light if self.light_threshold.is_none() => {
                Err(ConfigError::Missing("WROMY_LIGHT_THRESHOLD"))
            }
            SensorKind::Radon if self.radon_serial.is_none() => {
                Err(ConfigError::Missing("WROMY_RADON_SERIAL"))
            }
            _ => Ok(()),
        }
    }

    /// Stream name of the configured sensor, e.g. `WS3`.
    pub fn stream(&self) -> String {
        self.sensor.stream_name(self.station)
    }
}

fn station_from_hostname() -> Result<StationIdentity, ConfigError> {
    let name = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let station =
        StationIdentity::from_hostname(&name).ok_or(ConfigError::NoStationId(name.clone()))?;
    info!("Station id {} taken from hostname '{}'", station, name);
    Ok(station)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DaemonConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&[("WROMY_SENSOR", "thp"), ("WROMY_STATION_ID", "4")]).unwrap();
        assert_eq!(config.sensor, SensorKind::Thp);
        assert_eq!(config.stream(), "WS4");
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.sample_period, Duration::from_secs(60));
        assert_eq!(config.window_capacity, 60);
        assert_eq!(config.missing_value, -9999.0);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.baud_rate, 4800);
        assert_eq!(config.i2c_address, 0x23);
        assert_eq!(config.reset_pin, 23);
        assert_eq!(config.serial_port, None);
        assert_eq!(config.notify_recipient, None);
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("WROMY_SENSOR", "bh1750"),
            ("WROMY_STATION_ID", "7"),
            ("WROMY_LIGHT_THRESHOLD", "12.5"),
            ("WROMY_I2C_ADDRESS", "0x5c"),
            ("WROMY_WINDOW_CAPACITY", "30"),
            ("WROMY_SAMPLE_PERIOD_SECS", "5"),
            ("WROMY_NOTIFY_RECIPIENT", " ops@example.org "),
        ])
        .unwrap();
        assert_eq!(config.sensor, SensorKind::Light);
        assert_eq!(config.stream(), "LX7");
        assert_eq!(config.light_threshold, Some(12.5));
        assert_eq!(config.i2c_address, 0x5c);
        assert_eq!(config.window_capacity, 30);
        assert_eq!(config.sample_period, Duration::from_secs(5));
        assert_eq!(config.notify_recipient.as_deref(), Some("ops@example.org"));
    }

    #[test]
    fn rejects_incomplete_station_settings() {
        assert_eq!(load(&[]), Err(ConfigError::Missing("WROMY_SENSOR")));
        assert_eq!(
            load(&[("WROMY_SENSOR", "light"), ("WROMY_STATION_ID", "1")]),
            Err(ConfigError::Missing("WROMY_LIGHT_THRESHOLD"))
        );
        assert_eq!(
            load(&[("WROMY_SENSOR", "radon"), ("WROMY_STATION_ID", "1")]),
            Err(ConfigError::Missing("WROMY_RADON_SERIAL"))
        );
        assert!(matches!(
            load(&[
                ("WROMY_SENSOR", "thp"),
                ("WROMY_STATION_ID", "1"),
                ("WROMY_WINDOW_CAPACITY", "0"),
            ]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            load(&[
                ("WROMY_SENSOR", "thp"),
                ("WROMY_STATION_ID", "1"),
                ("WROMY_MAX_ATTEMPTS", "0"),
            ]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn pins_are_bcm_header_lines() {
        let config = load(&[
            ("WROMY_SENSOR", "radon"),
            ("WROMY_STATION_ID", "1"),
            ("WROMY_RADON_SERIAL", "2950040221"),
            ("WROMY_RESET_PIN", "17"),
            ("WROMY_BUZZER_PIN", "27"),
        ])
        .unwrap();
        assert_eq!(config.reset_pin, 17);
        assert_eq!(config.buzzer_pin, Some(27));

        // Kernel sysfs numbers (base 512 on current kernels) are not BCM lines.
        assert!(matches!(
            load(&[
                ("WROMY_SENSOR", "thp"),
                ("WROMY_STATION_ID", "1"),
                ("WROMY_RESET_PIN", "535"),
            ]),
            Err(ConfigError::Invalid { key: "WROMY_RESET_PIN", .. })
        ));
        assert!(matches!(
            load(&[
                ("WROMY_SENSOR", "thp"),
                ("WROMY_STATION_ID", "1"),
                ("WROMY_RESET_PIN", "200"),
            ]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_unparsable_values() {
        assert_eq!(
            load(&[("WROMY_SENSOR", "sonar"), ("WROMY_STATION_ID", "1")]),
            Err(ConfigError::Invalid {
                key: "WROMY_SENSOR",
                value: "sonar".to_string()
            })
        );
        assert!(matches!(
            load(&[("WROMY_SENSOR", "thp"), ("WROMY_STATION_ID", "one")]),
            Err(ConfigError::Invalid { key: "WROMY_STATION_ID", .. })
        ));
    }
}
