use log::{error, info};
use time::OffsetDateTime;

use wromy_acquisition::config::DaemonConfig;
use wromy_acquisition::error::ConfigError;
use wromy_acquisition::gpio::OutputPin;
#[cfg(feature = "gpio")]
use wromy_acquisition::gpio::RpiPin;
use wromy_acquisition::journal::Journal;
use wromy_acquisition::models::SensorKind;
use wromy_acquisition::notify::MailNotifier;
use wromy_acquisition::recovery::{FaultController, RetryPolicy};
use wromy_acquisition::station::{ReadingOf, Station};
use wromy_acquisition::utils::{duration_to_seconds, format_datetime};
use wromy_acquisition::Acquisition;

type BoxError = Box<dyn std::error::Error>;

fn fault_controller(config: &DaemonConfig) -> FaultController {
    let faults = FaultController::new(config.station);
    match &config.notify_recipient {
        Some(recipient) => {
            info!("Sending notifications to {}", recipient);
            faults.with_notifier(Box::new(MailNotifier::new(recipient.clone())))
        }
        None => faults,
    }
}

/// Claim a configured output line; a line that cannot be driven ends startup.
#[cfg(feature = "gpio")]
fn output_pin(number: u8, purpose: &str) -> Result<Box<dyn OutputPin>, BoxError> {
    let pin = RpiPin::output(number)
        .map_err(|e| format!("{} on GPIO {} unavailable: {}", purpose, number, e))?;
    info!("{} on GPIO {}", purpose, number);
    Ok(Box::new(pin))
}

#[cfg(not(feature = "gpio"))]
fn output_pin(number: u8, purpose: &str) -> Result<Box<dyn OutputPin>, BoxError> {
    Err(format!("{} on GPIO {} needs GPIO support (feature `gpio`)", purpose, number).into())
}

async fn run_station<S: Station>(
    station: S,
    config: &DaemonConfig,
    faults: FaultController,
) -> Result<(), BoxError> {
    let journal =
        Journal::for_reading::<ReadingOf<S>>(config.data_dir.clone(), config.stream());
    let acquisition = Acquisition::new(station, journal, faults)
        .with_retry_policy(RetryPolicy::new(config.max_attempts, config.retry_delay))
        .with_missing_value(config.missing_value);
    acquisition.run().await?;
    Ok(())
}

#[cfg(feature = "serial")]
async fn run_thp(config: &DaemonConfig) -> Result<(), BoxError> {
    use wromy_acquisition::decode::ThpDecoder;
    use wromy_acquisition::recovery::ResetLine;
    use wromy_acquisition::serial::SerialFactory;
    use wromy_acquisition::station::ThpStation;

    let factory = SerialFactory::new(config.serial_port.clone(), config.baud_rate);
    let station = ThpStation::new(factory, ThpDecoder::new(config.missing_value));

    let reset = output_pin(config.reset_pin, "Reset relais")?;
    let faults = fault_controller(config).with_reset_line(ResetLine::new(reset));
    run_station(station, config, faults).await
}

#[cfg(not(feature = "serial"))]
async fn run_thp(_config: &DaemonConfig) -> Result<(), BoxError> {
    Err("built without serial support (feature `serial`)".into())
}

#[cfg(feature = "i2c")]
async fn run_light(config: &DaemonConfig) -> Result<(), BoxError> {
    use wromy_acquisition::i2c::I2cFactory;
    use wromy_acquisition::station::LightStation;
    use wromy_acquisition::threshold::ThresholdPolicy;

    let threshold = config
        .light_threshold
        .ok_or(ConfigError::Missing("WROMY_LIGHT_THRESHOLD"))?;
    let station = LightStation::new(
        I2cFactory::new(config.i2c_bus),
        config.station,
        config.window_capacity,
        ThresholdPolicy::new(threshold),
        config.sample_period,
    )
    .with_address(config.i2c_address)
    .with_missing_value(config.missing_value);

    run_station(station, config, fault_controller(config)).await
}

#[cfg(not(feature = "i2c"))]
async fn run_light(_config: &DaemonConfig) -> Result<(), BoxError> {
    Err("built without I2C support (feature `i2c`)".into())
}

#[cfg(feature = "bluetooth")]
async fn run_radon(config: &DaemonConfig) -> Result<(), BoxError> {
    use wromy_acquisition::alarm::RadonAlarm;
    use wromy_acquisition::bluetooth::scanner::BluerFactory;
    use wromy_acquisition::decode::RadonDecoder;
    use wromy_acquisition::station::RadonStation;

    let serial = config
        .radon_serial
        .ok_or(ConfigError::Missing("WROMY_RADON_SERIAL"))?;
    let mut station = RadonStation::new(
        BluerFactory,
        serial,
        RadonDecoder::new(config.missing_value),
        config.sample_period,
    )
    .with_missing_value(config.missing_value);

    if let Some(number) = config.buzzer_pin {
        station = station.with_alarm(RadonAlarm::new(output_pin(number, "Radon buzzer")?));
    }
    run_station(station, config, fault_controller(config)).await
}

#[cfg(not(feature = "bluetooth"))]
async fn run_radon(_config: &DaemonConfig) -> Result<(), BoxError> {
    Err("built without Bluetooth support (feature `bluetooth`)".into())
}

async fn main_loop(config: DaemonConfig) -> Result<(), BoxError> {
    info!(
        "Starting {} acquisition for station {} into {}",
        config.sensor,
        config.station,
        config.data_dir.display()
    );
    match config.sensor {
        SensorKind::Thp => run_thp(&config).await,
        SensorKind::Light => run_light(&config).await,
        SensorKind::Radon => run_radon(&config).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let config = match DaemonConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let started = OffsetDateTime::now_utc();
    info!("Daemon started at {}", format_datetime(&started));

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    let uptime = || duration_to_seconds(OffsetDateTime::now_utc() - started);
    tokio::select! {
        result = main_loop(config) => {
            if let Err(e) = result {
                error!("Fatal error after {} s: {}", uptime(), e);
                std::process::exit(1);
            }
        }
        _ = &mut rx => {
            info!("Terminated by user after {} s. Exiting gracefully.", uptime());
        }
    }

    Ok(())
}
