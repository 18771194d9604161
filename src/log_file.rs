//! File-backed data log component.
//!
//! A [`LogComponent`] appends [`DataRecord`]s as CSV rows to a file and walks the
//! lifecycle documented on [`LifecycleState`]. The state, the open writer and the
//! current path all live behind one `parking_lot::Mutex`, so the foreground control
//! path and the acquisition thread can call into the same log concurrently:
//!
//! - `write` holds the lock for the whole append, so `stop` acquiring the lock is a
//!   barrier for any write already in flight.
//! - `rotate` renames the file while still holding the lock, so no `open` can race
//!   the archive onto the same path.
//!
//! The first row written into an empty file is preceded by a header: a `# <title>`
//! comment line and the column header row. Nothing is written by `open` or `run`, so a
//! freshly rotated log starts with an empty file.

use crate::core::{DataRecord, Lifecycle, LifecycleState, Named};
use crate::error::{CldError, CldResult};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Timestamp format used when none is configured.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Static configuration of a log component, taken from its document declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// Directory the log file lives in.
    pub directory: PathBuf,
    /// File name; chrono strftime specifiers are expanded at `open()`.
    pub file_template: String,
    /// Title written as the first comment line of a new file.
    pub title: String,
    /// Format of the suffix appended when a file is archived with a timestamp.
    pub timestamp_format: String,
    /// Channel names written as columns. Empty means every channel in the record.
    pub columns: Vec<String>,
}

impl LogSettings {
    /// Settings for a log named `name` writing `<name>.csv` into the working directory.
    pub fn new(name: &str) -> Self {
        Self {
            directory: PathBuf::from("."),
            file_template: format!("{name}.csv"),
            title: name.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            columns: Vec::new(),
        }
    }

    /// Set the directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the file name template.
    pub fn with_file(mut self, file_template: impl Into<String>) -> Self {
        self.file_template = file_template.into();
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the archive timestamp format.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Set the columns.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }
}

#[derive(Default)]
struct LogInner {
    state: LifecycleState,
    writer: Option<csv::Writer<File>>,
    path: Option<PathBuf>,
    header_pending: bool,
    records_written: u64,
}

/// A named CSV log with the open/run/stop/rotate lifecycle.
pub struct LogComponent {
    name: String,
    settings: LogSettings,
    inner: Mutex<LogInner>,
}

impl std::fmt::Debug for LogComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogComponent")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("state", &self.current_state())
            .finish()
    }
}

impl LogComponent {
    /// Create a closed log component.
    pub fn new(name: impl Into<String>, settings: LogSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(LogInner::default()),
        }
    }

    /// The component's settings.
    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Path of the file currently held, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    /// Rows appended since the component was created.
    pub fn records_written(&self) -> u64 {
        self.inner.lock().records_written
    }

    /// Closed → Open. Opens the resolved file path in append mode.
    ///
    /// On failure the component stays Closed.
    pub fn open(&self) -> CldResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Closed {
            return Err(CldError::invalid_state(&self.name, "open", inner.state));
        }

        let path = self.resolve_path(Local::now())?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| CldError::FileOpen {
                path: path.clone(),
                source,
            })?;
        let empty = file
            .metadata()
            .map_err(|source| CldError::FileOpen {
                path: path.clone(),
                source,
            })?
            .len()
            == 0;

        inner.writer = Some(
            csv::WriterBuilder::new()
                .flexible(true)
                .from_writer(file),
        );
        inner.header_pending = empty;
        inner.state = LifecycleState::Open;
        info!(log = %self.name, path = %path.display(), "Opened log file");
        inner.path = Some(path);
        Ok(())
    }

    /// Open → Running. Marks the component ready to accept writes.
    pub fn run(&self) -> CldResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Open {
            return Err(CldError::invalid_state(&self.name, "run", inner.state));
        }
        inner.state = LifecycleState::Running;
        debug!(log = %self.name, "Log running");
        Ok(())
    }

    /// Append one record. Only permitted while Running; otherwise the record is dropped.
    pub fn write(&self, record: &DataRecord) -> CldResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Running {
            return Err(CldError::invalid_state(&self.name, "write", inner.state));
        }
        self.append(&mut inner, record)
    }

    /// Append one record if Running, atomically with the state check.
    ///
    /// Returns `Ok(false)` without touching the file in any other state.
    pub fn write_if_running(&self, record: &DataRecord) -> CldResult<bool> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Running {
            return Ok(false);
        }
        self.append(&mut inner, record).map(|()| true)
    }

    /// Running → Stopped. Flushes and keeps the file open but inactive.
    ///
    /// Taking the lock waits out any write in progress; no write is accepted after
    /// this returns until the next `run()`. The transition happens even if the flush
    /// fails, so the log can still be rotated; the flush error is returned.
    pub fn stop(&self) -> CldResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Running {
            return Err(CldError::invalid_state(&self.name, "stop", inner.state));
        }
        inner.state = LifecycleState::Stopped;

        if let Some(writer) = inner.writer.as_mut() {
            writer.flush().map_err(|e| CldError::SinkWrite {
                name: self.name.clone(),
                message: format!("flush failed: {e}"),
            })?;
        }
        info!(log = %self.name, records = inner.records_written, "Log stopped");
        Ok(())
    }

    /// Stopped → Closed. Closes the file and renames it out of the way.
    ///
    /// With `archive` the new name carries a timestamp suffix formatted with
    /// [`LogSettings::timestamp_format`]; without it, the lowest free sequence number.
    /// Returns the archive path. Never permitted while Running.
    ///
    /// The component ends Closed even when the final flush or the rename fails; the
    /// failure is returned after the file has been archived as far as possible.
    pub fn rotate(&self, archive: bool) -> CldResult<PathBuf> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Stopped {
            return Err(CldError::invalid_state(&self.name, "rotate", inner.state));
        }

        let writer = inner.writer.take();
        let path = inner.path.take();
        inner.state = LifecycleState::Closed;
        inner.header_pending = false;

        let flushed = match writer {
            Some(mut writer) => writer.flush().map_err(|e| CldError::SinkWrite {
                name: self.name.clone(),
                message: format!("flush before rotation failed: {e}"),
            }),
            None => Ok(()),
        };

        let path = path.ok_or_else(|| {
            CldError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("log '{}' had no file to rotate", self.name),
            ))
        })?;
        let destination = self.archive_destination(&path, archive);
        std::fs::rename(&path, &destination)?;

        info!(
            log = %self.name,
            from = %path.display(),
            to = %destination.display(),
            "Rotated log file"
        );
        if let Err(e) = flushed {
            warn!(log = %self.name, error = %e, "Archived log is missing buffered rows");
            return Err(e);
        }
        Ok(destination)
    }

    fn append(&self, inner: &mut LogInner, record: &DataRecord) -> CldResult<()> {
        let sink_error = |message: String| CldError::SinkWrite {
            name: self.name.clone(),
            message,
        };

        let writer = inner
            .writer
            .as_mut()
            .ok_or_else(|| sink_error("no open file".to_string()))?;

        if inner.header_pending {
            writer.flush().map_err(|e| sink_error(e.to_string()))?;
            // The title is a raw comment line, so it bypasses csv quoting.
            let mut file: &File = writer.get_ref();
            writeln!(file, "# {}", self.settings.title).map_err(|e| sink_error(e.to_string()))?;

            let mut header = vec!["timestamp".to_string()];
            if self.settings.columns.is_empty() {
                header.extend(record.values.iter().map(|(name, _)| name.clone()));
            } else {
                header.extend(self.settings.columns.iter().cloned());
            }
            writer
                .write_record(&header)
                .map_err(|e| sink_error(e.to_string()))?;
            inner.header_pending = false;
        }

        let mut row = vec![record.timestamp.to_rfc3339()];
        if self.settings.columns.is_empty() {
            row.extend(record.values.iter().map(|(_, value)| value.to_string()));
        } else {
            row.extend(self.settings.columns.iter().map(|column| {
                record
                    .value(column)
                    .map_or(String::new(), |value| value.to_string())
            }));
        }
        writer
            .write_record(&row)
            .map_err(|e| sink_error(e.to_string()))?;
        writer.flush().map_err(|e| sink_error(e.to_string()))?;

        inner.records_written += 1;
        Ok(())
    }

    fn resolve_path(&self, now: DateTime<Local>) -> CldResult<PathBuf> {
        let file_name = format_time(&self.settings.file_template, now).ok_or_else(|| {
            CldError::FileOpen {
                path: self.settings.directory.join(&self.settings.file_template),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid time specifier in file template",
                ),
            }
        })?;
        Ok(self.settings.directory.join(file_name))
    }

    fn archive_destination(&self, path: &Path, archive: bool) -> PathBuf {
        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        if archive {
            let stamp = format_time(&self.settings.timestamp_format, Local::now())
                .unwrap_or_else(|| {
                    warn!(
                        log = %self.name,
                        format = %self.settings.timestamp_format,
                        "Invalid timestamp format, using default"
                    );
                    Local::now().format(DEFAULT_TIMESTAMP_FORMAT).to_string()
                })
                .replace(['/', '\\'], "-");
            first_free(directory, &format!("{stem}-{stamp}"), &extension)
        } else {
            // `stem.ext` is the file being rotated, so the first free name is numbered.
            first_free(directory, &stem, &extension)
        }
    }
}

impl Named for LogComponent {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Lifecycle for LogComponent {
    fn open(&self) -> CldResult<()> {
        LogComponent::open(self)
    }

    fn run(&self) -> CldResult<()> {
        LogComponent::run(self)
    }

    fn stop(&self) -> CldResult<()> {
        LogComponent::stop(self)
    }

    fn rotate(&self, archive: bool) -> CldResult<PathBuf> {
        LogComponent::rotate(self, archive)
    }

    fn current_state(&self) -> LifecycleState {
        LogComponent::current_state(self)
    }
}

/// Expand strftime specifiers; `None` if the format string is invalid.
fn format_time(format: &str, now: DateTime<Local>) -> Option<String> {
    if !format.contains('%') {
        return Some(format.to_string());
    }
    let mut out = String::new();
    write!(out, "{}", now.format(format)).ok()?;
    Some(out)
}

/// `base + ext`, or `base-N + ext` for the lowest N that does not exist yet.
fn first_free(directory: &Path, base: &str, extension: &str) -> PathBuf {
    let candidate = directory.join(format!("{base}{extension}"));
    if !candidate.exists() {
        return candidate;
    }
    let mut n = 1u32;
    loop {
        let candidate = directory.join(format!("{base}-{n}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
