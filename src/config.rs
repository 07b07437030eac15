//! Configuration management for the request guard server.
//!
//! This module handles loading and validating configuration from environment
//! variables using the `dotenvy` crate. All operations return
//! [`GuardResult`] for comprehensive error handling.
//!
//! ## Environment Variables
//!
//! All optional (with defaults):
//! - `HOST`: Bind address (default: 0.0.0.0)
//! - `PORT`: Listen port (default: 8080)
//! - `INCLUDE_STACK`: Attach stack traces to recovered panics (default: true)
//! - `TRUST_FORWARDED_HEADERS`: Resolve client IPs from `X-Forwarded-For` /
//!   `X-Real-IP` (default: true)
//! - `REQUEST_TIMEOUT_SECS`: Per-request timeout, `0` disables (default: 30)
//! - `LOG_LEVEL`: Structured log threshold: debug, info or error (default: debug)
//! - `LOG_FILE`: Structured log file; unset forwards entries to tracing
//! - `LOG_ROTATION`: minutely, hourly, daily or never (default: daily)
//! - `LOG_MAX_FILES`: Rotated files to keep, `0` keeps all (default: 5)
//!
//! ## Example
//!
//! ```no_run
//! use request_guard::config::Config;
//! use request_guard::error::GuardResult;
//!
//! # fn main() -> GuardResult<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```

use crate::error::{GuardError, GuardResult};
use crate::observability::Level;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing_appender::rolling::Rotation;

/// How often the structured log file rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// New file every minute.
    Minutely,
    /// New file every hour.
    Hourly,
    /// New file every day.
    Daily,
    /// Single file, never rotated.
    Never,
}

impl LogRotation {
    /// The equivalent `tracing-appender` policy.
    #[must_use]
    pub const fn into_rotation(self) -> Rotation {
        match self {
            Self::Minutely => Rotation::MINUTELY,
            Self::Hourly => Rotation::HOURLY,
            Self::Daily => Rotation::DAILY,
            Self::Never => Rotation::NEVER,
        }
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Minutely => "minutely",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        })
    }
}

impl FromStr for LogRotation {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(Self::Minutely),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            other => Err(GuardError::config(
                format!("LOG_ROTATION must be minutely, hourly, daily or never, got: {other}"),
                None,
            )),
        }
    }
}

/// Settings for the structured log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    level: Level,
    file: Option<PathBuf>,
    rotation: LogRotation,
    max_files: usize,
}

impl LogConfig {
    /// Create log settings.
    #[must_use]
    pub const fn new(
        level: Level,
        file: Option<PathBuf>,
        rotation: LogRotation,
        max_files: usize,
    ) -> Self {
        Self {
            level,
            file,
            rotation,
            max_files,
        }
    }

    /// Threshold below which entries are dropped.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Log file path, if entries go to a file.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// File rotation policy.
    #[must_use]
    pub const fn rotation(&self) -> LogRotation {
        self.rotation
    }

    /// Number of rotated files kept on disk.
    #[must_use]
    pub const fn max_files(&self) -> usize {
        self.max_files
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(Level::Debug, None, LogRotation::Daily, 5)
    }
}

/// Main configuration struct for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address to bind
    host: IpAddr,

    /// Port to listen on
    port: u16,

    /// Attach stack traces to generic panic entries
    include_stack: bool,

    /// Trust proxy headers when resolving the client IP
    trust_forwarded_headers: bool,

    /// Per-request timeout enforced by the host
    request_timeout: Option<Duration>,

    /// Structured log settings
    log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            include_stack: true,
            trust_forwarded_headers: true,
            request_timeout: Some(Duration::from_secs(30)),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for unset variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that does not parse.
    pub fn from_env() -> GuardResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value does not parse.
    pub fn from_lookup<F>(lookup: F) -> GuardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_or(&lookup, "HOST", defaults.host, "a valid IP address")?;
        let port = parse_or(&lookup, "PORT", defaults.port, "a valid port number")?;
        let include_stack = parse_or(
            &lookup,
            "INCLUDE_STACK",
            defaults.include_stack,
            "'true' or 'false'",
        )?;
        let trust_forwarded_headers = parse_or(
            &lookup,
            "TRUST_FORWARDED_HEADERS",
            defaults.trust_forwarded_headers,
            "'true' or 'false'",
        )?;

        // 0 disables the timeout entirely
        let timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30, "a valid number")?;
        let request_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let level = match lookup("LOG_LEVEL") {
            Some(value) => value.parse::<Level>()?,
            None => defaults.log.level,
        };
        let file = lookup("LOG_FILE")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let rotation = match lookup("LOG_ROTATION") {
            Some(value) => value.parse::<LogRotation>()?,
            None => defaults.log.rotation,
        };
        let max_files = parse_or(&lookup, "LOG_MAX_FILES", defaults.log.max_files, "a valid number")?;

        Ok(Self {
            host,
            port,
            include_stack,
            trust_forwarded_headers,
            request_timeout,
            log: LogConfig::new(level, file, rotation, max_files),
        })
    }

    /// Override the listen port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override whether generic panic entries carry a stack trace.
    #[must_use]
    pub const fn with_include_stack(mut self, include_stack: bool) -> Self {
        self.include_stack = include_stack;
        self
    }

    /// Get the bind address.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Get the listen port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Get the socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Check if generic panic entries carry a stack trace.
    #[must_use]
    pub const fn include_stack(&self) -> bool {
        self.include_stack
    }

    /// Check if proxy headers are trusted for client IPs.
    #[must_use]
    pub const fn trust_forwarded_headers(&self) -> bool {
        self.trust_forwarded_headers
    }

    /// Get the per-request timeout, if any.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Get the structured log settings.
    #[must_use]
    pub const fn log(&self) -> &LogConfig {
        &self.log
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, expected: &str) -> GuardResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| {
            GuardError::config(format!("{key} must be {expected}, got: {value}"), Some(Box::new(e)))
        }),
        None => Ok(default),
    }
}
