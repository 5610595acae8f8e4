//! Acoustic radon warning.

use std::time::Duration;

use log::{error, warn};

use crate::gpio::{pulse, OutputPin};

/// Radon short-term average (Bq/m3) above which the buzzer warns.
pub const WARNING_LEVEL: f64 = 300.0;
/// Radon short-term average (Bq/m3) above which the buzzer alarms.
pub const CRITICAL_LEVEL: f64 = 1000.0;

const BEEPS: u32 = 10;
const BEEP_ON: Duration = Duration::from_secs(1);
const WARNING_PAUSE: Duration = Duration::from_secs(2);
const CRITICAL_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmLevel {
    Warning,
    Critical,
}

impl AlarmLevel {
    pub fn classify(radon: f64) -> Option<Self> {
        if radon > CRITICAL_LEVEL {
            Some(AlarmLevel::Critical)
        } else if radon > WARNING_LEVEL {
            Some(AlarmLevel::Warning)
        } else {
            None
        }
    }
}

/// Buzzer sounded after a radon sample above the warning level.
///
/// Ten one-second beeps; the pause between beeps is shorter for critical
/// levels.
pub struct RadonAlarm {
    buzzer: Box<dyn OutputPin>,
    beep_on: Duration,
    warning_pause: Duration,
    critical_pause: Duration,
}

impl RadonAlarm {
    pub fn new(buzzer: Box<dyn OutputPin>) -> Self {
        Self {
            buzzer,
            beep_on: BEEP_ON,
            warning_pause: WARNING_PAUSE,
            critical_pause: CRITICAL_PAUSE,
        }
    }

    pub fn with_timing(
        mut self,
        beep_on: Duration,
        warning_pause: Duration,
        critical_pause: Duration,
    ) -> Self {
        self.beep_on = beep_on;
        self.warning_pause = warning_pause;
        self.critical_pause = critical_pause;
        self
    }

    /// Sound the buzzer if `radon` calls for it. A buzzer that cannot be
    /// driven is logged and otherwise ignored.
    pub async fn check(&mut self, radon: f64) -> Option<AlarmLevel> {
        let level = AlarmLevel::classify(radon)?;
        warn!("Radon level {} Bq/m3 is {:?}", radon, level);

        let pause = match level {
            AlarmLevel::Warning => self.warning_pause,
            AlarmLevel::Critical => self.critical_pause,
        };
        for _ in 0..BEEPS {
            if let Err(e) = pulse(self.buzzer.as_mut(), self.beep_on, pause).await {
                error!("Failed to drive buzzer: {}", e);
                break;
            }
        }
        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::tests::RecordingPin;
    use crate::models::MISSING_VALUE;

    #[test]
    fn classifies_levels() {
        assert_eq!(AlarmLevel::classify(MISSING_VALUE), None);
        assert_eq!(AlarmLevel::classify(300.0), None);
        assert_eq!(AlarmLevel::classify(301.0), Some(AlarmLevel::Warning));
        assert_eq!(AlarmLevel::classify(1000.0), Some(AlarmLevel::Warning));
        assert_eq!(AlarmLevel::classify(1001.0), Some(AlarmLevel::Critical));
    }

    #[tokio::test]
    async fn sounds_ten_beeps() {
        let pin = RecordingPin::default();
        let mut alarm = RadonAlarm::new(Box::new(pin.clone())).with_timing(
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
        );

        assert_eq!(alarm.check(1500.0).await, Some(AlarmLevel::Critical));
        assert_eq!(pin.pulses(), 10);

        assert_eq!(alarm.check(50.0).await, None);
        assert_eq!(pin.pulses(), 10);
    }
}
