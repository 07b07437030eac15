//! JSON-lines sink backed by `tracing-appender`.
//!
//! Each entry becomes a single line written through a lossy non-blocking
//! writer, so emitting never waits on disk I/O. The background worker is
//! owned by the sink; [`StructuredLog::flush`] shuts it down and waits for
//! the queue to drain.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::RollingFileAppender;

use super::entry::{Level, LogEntry};
use super::sink::StructuredLog;
use crate::config::LogRotation;
use crate::error::{GuardError, GuardResult};

/// Writes entries as JSON lines to any blocking writer via a worker thread.
pub struct JsonLog {
    writer: NonBlocking,
    min_level: Level,
    guard: Mutex<Option<WorkerGuard>>,
}

impl JsonLog {
    /// Wrap `writer` in a non-blocking worker.
    pub fn new<W>(writer: W, min_level: Level) -> Self
    where
        W: Write + Send + 'static,
    {
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .thread_name("request-guard-log")
            .finish(writer);

        Self {
            writer,
            min_level,
            guard: Mutex::new(Some(guard)),
        }
    }

    /// Write to a rolling file named after `path`.
    ///
    /// `./logs/access.log` rotates into `./logs/access.<date>.log`. At most
    /// `max_files` files are kept; `0` keeps every file.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::LogInitError`] if the directory cannot be
    /// created or the appender cannot open its first file.
    pub fn rolling(
        path: &Path,
        rotation: LogRotation,
        max_files: usize,
        min_level: Level,
    ) -> GuardResult<Self> {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory).map_err(|e| {
            GuardError::log_init(
                format!("cannot create log directory {}", directory.display()),
                Some(Box::new(e)),
            )
        })?;

        let prefix = path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("request-guard");
        let suffix = path.extension().and_then(OsStr::to_str).unwrap_or("log");

        let mut builder = RollingFileAppender::builder()
            .rotation(rotation.into_rotation())
            .filename_prefix(prefix)
            .filename_suffix(suffix);
        if max_files > 0 {
            builder = builder.max_log_files(max_files);
        }

        let appender = builder.build(directory).map_err(|e| {
            GuardError::log_init(
                format!("cannot open rolling log file {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self::new(appender, min_level))
    }

    fn render(entry: &LogEntry) -> Option<Vec<u8>> {
        let mut line = serde_json::to_vec(&entry.to_json(Utc::now())).ok()?;
        line.push(b'\n');
        Some(line)
    }
}

impl StructuredLog for JsonLog {
    fn emit(&self, entry: LogEntry) {
        if entry.level() < self.min_level {
            return;
        }
        if let Some(line) = Self::render(&entry) {
            let mut writer = self.writer.clone();
            let _ = writer.write_all(&line);
        }
    }

    fn flush(&self) {
        let guard = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Dropping the guard drains the worker's queue before returning.
        drop(guard);
    }
}
