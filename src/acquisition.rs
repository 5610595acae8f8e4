//! The sampling loop shared by all stations.
//!
//! One cycle reads a frame, stamps it with the current UTC time, rotates the
//! output files when the day or year changed, decodes, runs fault recovery,
//! writes exactly one row and lets the station react. Then the loop sleeps
//! for the station's sample period, if it has one.

use log::{debug, info, warn};
use tokio::time::sleep;

use crate::decode::{Decoder, RawFrame};
use crate::error::{AcquisitionError, DecodeError};
use crate::journal::Journal;
use crate::models::{Fault, Measurement, Reading, MISSING_VALUE};
use crate::recovery::{FaultController, RetryPolicy};
use crate::station::{ReadingOf, Station};
use crate::utils::{format_datetime, Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Between cycles.
    Idle,
    /// Waiting for, decoding and writing a frame.
    Sampling,
    /// Switching to the files of a new day or year.
    Rotating,
    /// Resetting a faulty sensor.
    FaultRecovery,
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport<R> {
    pub measurement: Measurement<R>,
    pub rotated: bool,
    pub fault: Option<Fault>,
    pub decode_error: Option<DecodeError>,
    /// Failed transport attempts before the frame was read.
    pub transport_failures: u32,
}

pub struct Acquisition<S: Station> {
    station: S,
    journal: Journal,
    faults: FaultController,
    retry: RetryPolicy,
    clock: Box<dyn Clock>,
    missing: f64,
    state: LoopState,
}

impl<S: Station> Acquisition<S> {
    pub fn new(station: S, journal: Journal, faults: FaultController) -> Self {
        Self {
            station,
            journal,
            faults,
            retry: RetryPolicy::default(),
            clock: Box::new(SystemClock),
            missing: MISSING_VALUE,
            state: LoopState::Idle,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Value written for every field of a frame that cannot be decoded.
    pub fn with_missing_value(mut self, missing: f64) -> Self {
        self.missing = missing;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Sample forever. Returns only with a fatal error.
    pub async fn run(mut self) -> Result<(), AcquisitionError> {
        let started = self.clock.now_utc();
        info!(
            "Starting {} acquisition for {} at {}",
            self.station.kind(),
            self.journal.stream(),
            format_datetime(&started)
        );
        self.journal.log(
            &started,
            &format!("START: started {} acquisition", self.station.kind()),
        )?;

        loop {
            self.cycle().await?;
            if let Some(period) = self.station.sample_period() {
                self.enter(LoopState::Idle);
                sleep(period).await;
            }
        }
    }

    /// Run one sampling cycle.
    pub async fn cycle(&mut self) -> Result<CycleReport<ReadingOf<S>>, AcquisitionError> {
        self.enter(LoopState::Sampling);
        let (frame, transport_failures) = self.acquire().await?;
        let at = self.clock.now_utc();

        let rotated = self.journal.needs_rotation(&at);
        if rotated {
            self.enter(LoopState::Rotating);
            self.journal.rotate(&at)?;
            self.enter(LoopState::Sampling);
        }

        let (reading, decode_error) = match self.station.decoder().decode(&frame) {
            Ok(reading) => (reading, None),
            Err(e) => {
                warn!("Failed to decode frame: {}", e);
                self.journal.log(&at, &format!("Failed to decode frame: {}", e))?;
                (ReadingOf::<S>::missing(self.missing), Some(e))
            }
        };
        let measurement = Measurement::new(at, reading);

        let fault = measurement.reading.fault();
        if let Some(fault) = &fault {
            self.enter(LoopState::FaultRecovery);
            self.faults.handle_fault(fault, &at, &mut self.journal).await?;
            self.enter(LoopState::Sampling);
        }

        self.journal.record(&measurement)?;
        debug!("Recorded {:?}", measurement.reading);
        self.station
            .after_record(&measurement, &mut self.journal)
            .await?;

        Ok(CycleReport {
            measurement,
            rotated,
            fault,
            decode_error,
            transport_failures,
        })
    }

    /// Read the next frame, reconnecting with bounded retries.
    ///
    /// The first failure of an episode is logged and reported; running out of
    /// attempts ends the run.
    async fn acquire(&mut self) -> Result<(RawFrame, u32), AcquisitionError> {
        let mut backoff = self.retry.start();
        loop {
            let error = match self.station.acquire().await {
                Ok(frame) => {
                    if backoff.attempts() > 0 {
                        info!(
                            "Transport recovered after {} failed attempt(s)",
                            backoff.attempts()
                        );
                    }
                    return Ok((frame, backoff.attempts()));
                }
                Err(e) => e,
            };

            self.station.drop_transport();
            if backoff.attempts() == 0 {
                let at = self.clock.now_utc();
                self.faults.transport_failure(&error, &at, &mut self.journal)?;
            }

            if let Err(fatal) = backoff.failed(error).await {
                let at = self.clock.now_utc();
                self.journal.log(&at, &format!("{} -> terminating", fatal))?;
                self.faults.notify(&format!("{} -> terminating", fatal));
                return Err(fatal);
            }
        }
    }

    fn enter(&mut self, state: LoopState) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}
