//! Fault handling: hardware resets for sensor faults, bounded reconnects for
//! transport failures.

use std::time::Duration;

use log::{error, warn};
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::error::{AcquisitionError, TransportError};
use crate::gpio::{pulse, OutputPin};
use crate::journal::Journal;
use crate::models::{Fault, StationIdentity};
use crate::notify::Notifier;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Minimum time the reset relay is held closed.
pub const RESET_HOLD: Duration = Duration::from_secs(1);
/// Time given to the sensor after the relay opens again.
pub const RESET_SETTLE: Duration = Duration::from_millis(100);

/// Bounded reconnect schedule with doubling delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: MAX_RETRY_DELAY.max(initial_delay),
        }
    }

    /// Fresh attempt counter for one reconnect episode.
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempts: 0,
            delay: self.initial_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Attempt counter of one reconnect episode.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    /// Failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a failed attempt.
    ///
    /// Waits before the next attempt, or gives up with
    /// [`AcquisitionError::RetriesExhausted`] once the ceiling is reached.
    pub async fn failed(&mut self, error: TransportError) -> Result<(), AcquisitionError> {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            return Err(AcquisitionError::RetriesExhausted {
                attempts: self.attempts,
                last: error,
            });
        }

        warn!(
            "Attempt {}/{} failed: {}; retrying in {:?}",
            self.attempts, self.policy.max_attempts, error, self.delay
        );
        sleep(self.delay).await;
        self.delay = (self.delay * 2).min(self.policy.max_delay);
        Ok(())
    }
}

/// Relay in the sensor's supply line, pulsed to power-cycle it.
pub struct ResetLine {
    pin: Box<dyn OutputPin>,
    hold: Duration,
    settle: Duration,
}

impl ResetLine {
    pub fn new(pin: Box<dyn OutputPin>) -> Self {
        Self::with_timing(pin, RESET_HOLD, RESET_SETTLE)
    }

    pub fn with_timing(pin: Box<dyn OutputPin>, hold: Duration, settle: Duration) -> Self {
        Self { pin, hold, settle }
    }

    pub async fn pulse(&mut self) -> std::io::Result<()> {
        pulse(self.pin.as_mut(), self.hold, self.settle).await
    }
}

/// Reacts to sensor faults and transport failures with hardware resets, log
/// entries and notifications.
pub struct FaultController {
    reset: Option<ResetLine>,
    notifier: Option<Box<dyn Notifier>>,
    subject: String,
}

impl FaultController {
    pub fn new(station: StationIdentity) -> Self {
        Self {
            reset: None,
            notifier: None,
            subject: format!("ERROR: WROMY-{}", station),
        }
    }

    pub fn with_reset_line(mut self, reset: ResetLine) -> Self {
        self.reset = Some(reset);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Pulse the reset line, log the fault and notify.
    ///
    /// A relay that cannot be switched is logged, not fatal: the cycle's row
    /// still has to be written.
    pub async fn handle_fault(
        &mut self,
        fault: &Fault,
        at: &OffsetDateTime,
        journal: &mut Journal,
    ) -> std::io::Result<()> {
        let action = match self.reset.as_mut() {
            Some(line) => {
                warn!("{} -> activating relais", fault);
                match line.pulse().await {
                    Ok(()) => "relais activated".to_string(),
                    Err(e) => {
                        error!("Failed to switch reset relais: {}", e);
                        format!("relais activation failed: {}", e)
                    }
                }
            }
            None => {
                warn!("{} but no reset line configured", fault);
                "no reset line configured".to_string()
            }
        };

        let message = format!("{} -> {}", fault, action);
        journal.log(at, &message)?;
        self.notify(&message);
        Ok(())
    }

    /// Log and report a broken transport; reconnecting is up to the caller.
    pub fn transport_failure(
        &mut self,
        error: &TransportError,
        at: &OffsetDateTime,
        journal: &mut Journal,
    ) -> std::io::Result<()> {
        error!("Transport failure: {}", error);
        let message = format!("Exception occurred while reading datastream: {}", error);
        journal.log(at, &message)?;
        self.notify(&message);
        Ok(())
    }

    /// Forward `body` to the notifier, if one is configured.
    pub fn notify(&self, body: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(&self.subject, body);
        }
    }
}
