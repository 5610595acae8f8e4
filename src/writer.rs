//! Append-only, day/year partitioned delimited files.
//!
//! Files are never truncated. A file gets its header exactly once, when it is
//! created, and every row is flushed before `append` returns.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::{debug, info};
use time::OffsetDateTime;

/// Network code leading every data file name.
pub const NETWORK_CODE: &str = "BW";

/// Station type in data and log file names.
pub const STATION_TYPE: &str = "WROMY";

/// A (directory, file name) pair. Holds no open descriptor; every append opens
/// the file, writes one row and closes it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    dir: PathBuf,
    name: String,
}

impl OutputFile {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// What [`ensure_file`] had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Creation {
    pub dir: bool,
    pub file: bool,
}

/// Make sure `dir/name` exists, creating the directory and the file as needed.
///
/// The header row is written only by the call that creates the file; an
/// existing file is left untouched.
pub fn ensure_file(
    dir: &Path,
    name: &str,
    header: &[&str],
) -> io::Result<(OutputFile, Creation)> {
    let mut creation = Creation::default();
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        creation.dir = true;
    }

    let file = OutputFile::new(dir, name);
    match OpenOptions::new().write(true).create_new(true).open(file.path()) {
        Ok(handle) => {
            creation.file = true;
            if !header.is_empty() {
                write_row(handle, header)?;
            }
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(e),
    }

    Ok((file, creation))
}

/// Append one row to an existing file and flush it.
pub fn append<S: AsRef<[u8]>>(file: &OutputFile, fields: &[S]) -> io::Result<()> {
    let handle = OpenOptions::new().append(true).open(file.path())?;
    write_row(handle, fields)
}

fn write_row<S: AsRef<[u8]>>(handle: fs::File, fields: &[S]) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(handle);
    writer.write_record(fields)?;
    writer.flush()?;
    Ok(())
}

/// How often a stream starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// `{base}/{stream}.D/{year}/BW.WROMY.{stream}.D.{year}.{doy}`
    Daily,
    /// `{base}/Logfiles/WROMY_{stream}_{year}.log`
    Yearly,
}

/// Calendar period covered by one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day { year: i32, ordinal: u16 },
    Year(i32),
}

impl Rotation {
    pub fn period(&self, at: &OffsetDateTime) -> Period {
        match self {
            Rotation::Daily => Period::Day {
                year: at.year(),
                ordinal: at.ordinal(),
            },
            Rotation::Yearly => Period::Year(at.year()),
        }
    }

    /// Directory and file name of the file covering `period`.
    pub fn location(&self, base: &Path, stream: &str, period: Period) -> (PathBuf, String) {
        match period {
            Period::Day { year, ordinal } => (
                base.join(format!("{}.D", stream)).join(year.to_string()),
                format!(
                    "{}.{}.{}.D.{}.{:03}",
                    NETWORK_CODE, STATION_TYPE, stream, year, ordinal
                ),
            ),
            Period::Year(year) => (
                base.join("Logfiles"),
                format!("{}_{}_{}.log", STATION_TYPE, stream, year),
            ),
        }
    }
}

/// The file a stream currently writes to, re-derived whenever the UTC period
/// changes.
#[derive(Debug, Clone)]
pub struct RotatingFile {
    base: PathBuf,
    stream: String,
    rotation: Rotation,
    header: &'static [&'static str],
    active: Option<(Period, OutputFile)>,
}

impl RotatingFile {
    pub fn new(
        base: impl Into<PathBuf>,
        stream: impl Into<String>,
        rotation: Rotation,
        header: &'static [&'static str],
    ) -> Self {
        Self {
            base: base.into(),
            stream: stream.into(),
            rotation,
            header,
            active: None,
        }
    }

    /// True when `at` falls outside the period of the active file, including
    /// before the first file was opened.
    pub fn needs_rotation(&self, at: &OffsetDateTime) -> bool {
        match &self.active {
            Some((period, _)) => *period != self.rotation.period(at),
            None => true,
        }
    }

    pub fn active(&self) -> Option<&OutputFile> {
        self.active.as_ref().map(|(_, file)| file)
    }

    /// The file for `at`, created with its header if it does not exist yet.
    pub fn current(&mut self, at: &OffsetDateTime) -> io::Result<(OutputFile, Creation)> {
        if let (false, Some((_, file))) = (self.needs_rotation(at), &self.active) {
            return Ok((file.clone(), Creation::default()));
        }

        let period = self.rotation.period(at);
        let (dir, name) = self.rotation.location(&self.base, &self.stream, period);
        let (file, creation) = ensure_file(&dir, &name, self.header)?;
        match &self.active {
            Some((_, previous)) => info!("Rotating {} -> {}", previous.name(), file.name()),
            None => debug!("Writing to {}", file.path().display()),
        }
        self.active = Some((period, file.clone()));
        Ok((file, creation))
    }

    /// Append a row to the file covering `at`.
    pub fn append<S: AsRef<[u8]>>(
        &mut self,
        at: &OffsetDateTime,
        fields: &[S],
    ) -> io::Result<Creation> {
        let (file, creation) = self.current(at)?;
        append(&file, fields)?;
        Ok(creation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const HEADER: &[&str] = &["Date", "Time (UTC)", "Value (u)"];

    fn read(path: impl AsRef<Path>) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn ensure_file_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("WS1.D").join("2024");

        let (file, creation) = ensure_file(&dir, "day", HEADER).unwrap();
        assert_eq!(creation, Creation { dir: true, file: true });
        append(&file, &["20240101", "000000", "1.5"]).unwrap();

        let (again, creation) = ensure_file(&dir, "day", HEADER).unwrap();
        assert_eq!(again, file);
        assert_eq!(creation, Creation::default());

        assert_eq!(
            read(file.path()),
            "Date,Time (UTC),Value (u)\n20240101,000000,1.5\n"
        );
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let tmp = tempfile::tempdir().unwrap();
        let (file, _) = ensure_file(tmp.path(), "log", &[]).unwrap();
        append(&file, &["20240101, 000000, created /data"]).unwrap();
        assert_eq!(read(file.path()), "\"20240101, 000000, created /data\"\n");
    }

    #[test]
    fn append_to_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let file = OutputFile::new(tmp.path(), "absent");
        assert!(append(&file, &["x"]).is_err());
    }

    #[test]
    fn daily_names_encode_year_and_day_of_year() {
        let (dir, name) = Rotation::Daily.location(
            Path::new("/data"),
            "WS3",
            Rotation::Daily.period(&datetime!(2024-02-05 10:00 UTC)),
        );
        assert_eq!(dir, Path::new("/data/WS3.D/2024"));
        assert_eq!(name, "BW.WROMY.WS3.D.2024.036");

        let (dir, name) = Rotation::Yearly.location(
            Path::new("/data"),
            "LX3",
            Rotation::Yearly.period(&datetime!(2024-02-05 10:00 UTC)),
        );
        assert_eq!(dir, Path::new("/data/Logfiles"));
        assert_eq!(name, "WROMY_LX3_2024.log");
    }

    #[test]
    fn day_rollover_opens_new_file_with_its_own_header() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stream = RotatingFile::new(tmp.path(), "WS2", Rotation::Daily, HEADER);

        let before = datetime!(2023-12-31 23:59:59 UTC);
        let after = datetime!(2024-01-01 00:00:01 UTC);

        assert!(stream.needs_rotation(&before));
        stream.append(&before, &["20231231", "235959", "1"]).unwrap();
        assert!(!stream.needs_rotation(&before));
        let old = stream.active().unwrap().path();

        assert!(stream.needs_rotation(&after));
        let creation = stream.append(&after, &["20240101", "000001", "2"]).unwrap();
        assert!(creation.dir && creation.file);
        let new = stream.active().unwrap().path();

        assert_eq!(
            old,
            tmp.path().join("WS2.D/2023/BW.WROMY.WS2.D.2023.365")
        );
        assert_eq!(new, tmp.path().join("WS2.D/2024/BW.WROMY.WS2.D.2024.001"));
        assert_eq!(read(&old), "Date,Time (UTC),Value (u)\n20231231,235959,1\n");
        assert_eq!(read(&new), "Date,Time (UTC),Value (u)\n20240101,000001,2\n");
    }

    #[test]
    fn restart_appends_to_existing_day_file() {
        let tmp = tempfile::tempdir().unwrap();
        let at = datetime!(2024-05-01 08:00 UTC);

        let mut first = RotatingFile::new(tmp.path(), "RDN", Rotation::Daily, HEADER);
        first.append(&at, &["a"]).unwrap();

        let mut second = RotatingFile::new(tmp.path(), "RDN", Rotation::Daily, HEADER);
        let creation = second.append(&at, &["b"]).unwrap();
        assert_eq!(creation, Creation::default());

        let content = read(second.active().unwrap().path());
        assert_eq!(content, "Date,Time (UTC),Value (u)\na\nb\n");
    }
}
