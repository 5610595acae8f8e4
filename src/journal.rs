//! Writer state of one station: its daily data stream and its yearly log.
//!
//! The acquisition loop owns a single [`Journal`] and passes it explicitly to
//! everything that writes rows or log entries.

use std::io;
use std::path::PathBuf;

use log::info;
use time::OffsetDateTime;

use crate::models::{Measurement, Reading};
use crate::utils::{format_date, format_time};
use crate::writer::{append, Creation, OutputFile, RotatingFile, Rotation};

/// Header of the yearly log files.
pub const LOG_HEADER: &[&str] = &["Date", "Time (UTC)", "Message"];

#[derive(Debug, Clone)]
pub struct Journal {
    stream: String,
    data: RotatingFile,
    log: RotatingFile,
}

/// `[date, time, message]` row of a log entry.
pub fn log_entry(at: &OffsetDateTime, message: &str) -> Vec<String> {
    vec![format_date(at), format_time(at), message.to_string()]
}

impl Journal {
    pub fn new(
        base: impl Into<PathBuf>,
        stream: impl Into<String>,
        data_header: &'static [&'static str],
    ) -> Self {
        let base = base.into();
        let stream = stream.into();
        Self {
            data: RotatingFile::new(base.clone(), stream.clone(), Rotation::Daily, data_header),
            log: RotatingFile::new(base, stream.clone(), Rotation::Yearly, LOG_HEADER),
            stream,
        }
    }

    /// Journal whose day files carry the header of reading type `R`.
    pub fn for_reading<R: Reading>(base: impl Into<PathBuf>, stream: impl Into<String>) -> Self {
        Self::new(base, stream, R::HEADER)
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// True when the day file or the log file for `at` is not the active one.
    pub fn needs_rotation(&self, at: &OffsetDateTime) -> bool {
        self.data.needs_rotation(at) || self.log.needs_rotation(at)
    }

    /// Open (creating if needed) the day file and log file covering `at`.
    pub fn rotate(&mut self, at: &OffsetDateTime) -> io::Result<()> {
        let (file, creation) = self.data.current(at)?;
        self.note_creation(at, &file, creation)?;
        self.log.current(at)?;
        Ok(())
    }

    /// Append the data row of `measurement` to its day file.
    pub fn record<R: Reading>(&mut self, measurement: &Measurement<R>) -> io::Result<()> {
        let at = measurement.taken_at;
        let (file, creation) = self.data.current(&at)?;
        self.note_creation(&at, &file, creation)?;
        append(&file, &measurement.row())
    }

    /// Append a `[date, time, message]` entry to the yearly log.
    pub fn log(&mut self, at: &OffsetDateTime, message: &str) -> io::Result<()> {
        self.log_row(at, &log_entry(at, message))
    }

    /// Append an arbitrary row to the yearly log.
    pub fn log_row<S: AsRef<[u8]>>(&mut self, at: &OffsetDateTime, fields: &[S]) -> io::Result<()> {
        let (file, creation) = self.log.current(at)?;
        if creation.file {
            info!("Created log file {}", file.path().display());
            append(&file, &log_entry(at, &format!("created {}", file.path().display())))?;
        }
        append(&file, fields)
    }

    fn note_creation(
        &mut self,
        at: &OffsetDateTime,
        file: &OutputFile,
        creation: Creation,
    ) -> io::Result<()> {
        if creation.dir {
            info!("Created data directory {}", file.dir().display());
            self.log(at, &format!("created {}", file.dir().display()))?;
        }
        if creation.file {
            info!("Created data file {}", file.name());
        }
        Ok(())
    }
}
