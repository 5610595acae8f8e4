//! Digital output pins used for reset relays and the radon buzzer.

use std::io;
use std::time::Duration;

use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

pub trait OutputPin {
    fn set_output(&mut self, level: Level) -> io::Result<()>;
}

/// Drive `pin` high for `hold`, then low, then wait `settle`.
///
/// The whole loop waits for the pulse; no sensor is read meanwhile.
pub async fn pulse(pin: &mut dyn OutputPin, hold: Duration, settle: Duration) -> io::Result<()> {
    pin.set_output(Level::High)?;
    sleep(hold).await;
    pin.set_output(Level::Low)?;
    sleep(settle).await;
    Ok(())
}

/// Output line on the Raspberry Pi header, addressed by BCM number.
///
/// The line is left as it is when the pin is dropped.
#[cfg(feature = "gpio")]
#[derive(Debug)]
pub struct RpiPin {
    pin: rppal::gpio::OutputPin,
}

#[cfg(feature = "gpio")]
impl RpiPin {
    /// Claim BCM line `number` as an output, initially low.
    pub fn output(number: u8) -> io::Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(io::Error::other)?;
        let mut pin = gpio.get(number).map_err(io::Error::other)?.into_output_low();
        pin.set_reset_on_drop(false);
        log::debug!("Claimed GPIO {} as output", number);
        Ok(Self { pin })
    }
}

#[cfg(feature = "gpio")]
impl OutputPin for RpiPin {
    fn set_output(&mut self, level: Level) -> io::Result<()> {
        match level {
            Level::Low => self.pin.set_low(),
            Level::High => self.pin.set_high(),
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every level it is driven to.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingPin {
        pub levels: Arc<Mutex<Vec<Level>>>,
    }

    impl RecordingPin {
        pub(crate) fn levels(&self) -> Vec<Level> {
            self.levels.lock().unwrap().clone()
        }

        /// Number of completed high/low pulses.
        pub(crate) fn pulses(&self) -> usize {
            self.levels()
                .windows(2)
                .filter(|pair| pair == &[Level::High, Level::Low])
                .count()
        }
    }

    impl OutputPin for RecordingPin {
        fn set_output(&mut self, level: Level) -> io::Result<()> {
            self.levels.lock().unwrap().push(level);
            Ok(())
        }
    }

    #[tokio::test]
    async fn pulse_asserts_then_releases() {
        let mut pin = RecordingPin::default();
        pulse(&mut pin, Duration::ZERO, Duration::ZERO).await.unwrap();
        assert_eq!(pin.levels(), vec![Level::High, Level::Low]);
        assert_eq!(pin.pulses(), 1);
    }
}
