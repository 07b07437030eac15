//! Error types for the request guard.
//!
//! This module provides a unified error type [`GuardError`] covering the
//! failures that can happen while setting up and running the instrumented
//! server. Faults raised *inside* request handling never surface here: they
//! are absorbed by the recovery interceptor and turned into responses.
//!
//! # Design
//!
//! The error hierarchy is organized by concern:
//! - [`GuardError::ConfigError`]: Configuration and environment issues
//! - [`GuardError::LogInitError`]: Logging backend or sink setup failures
//! - [`GuardError::ServerError`]: Binding or serving failures
//!
//! All errors implement [`std::error::Error`] and keep the underlying cause
//! in the source chain.
//!
//! # Example
//!
//! ```
//! use request_guard::error::{GuardError, GuardResult};
//!
//! fn validate_port(port: u16) -> GuardResult<()> {
//!     if port == 0 {
//!         return Err(GuardError::config("PORT cannot be zero", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`GuardError`].
pub type GuardResult<T> = Result<T, GuardError>;

/// Boxed underlying cause carried by every [`GuardError`] variant.
pub type ErrorSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the request guard.
#[derive(Debug)]
pub enum GuardError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Unparseable numbers or booleans
    /// - Unknown log levels or rotation policies
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<ErrorSource>,
    },

    /// Logging backend errors.
    ///
    /// Variants include:
    /// - Log directory cannot be created
    /// - Rolling file appender cannot be opened
    /// - A global subscriber is already installed
    LogInitError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<ErrorSource>,
    },

    /// Server errors.
    ///
    /// Variants include:
    /// - Address already in use
    /// - Accept loop failures
    ServerError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<ErrorSource>,
    },
}

impl GuardError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use request_guard::error::GuardError;
    ///
    /// let err = GuardError::config("PORT must be a valid port number", None);
    /// assert!(matches!(err, GuardError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<ErrorSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new logging initialization error.
    ///
    /// # Example
    ///
    /// ```
    /// use request_guard::error::GuardError;
    ///
    /// let err = GuardError::log_init("cannot open log file", None);
    /// assert!(matches!(err, GuardError::LogInitError { .. }));
    /// ```
    #[must_use]
    pub fn log_init(message: impl Into<String>, source: Option<ErrorSource>) -> Self {
        Self::LogInitError {
            message: message.into(),
            source,
        }
    }

    /// Create a new server error.
    ///
    /// # Example
    ///
    /// ```
    /// use request_guard::error::GuardError;
    ///
    /// let err = GuardError::server("failed to bind", None);
    /// assert!(matches!(err, GuardError::ServerError { .. }));
    /// ```
    #[must_use]
    pub fn server(message: impl Into<String>, source: Option<ErrorSource>) -> Self {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::LogInitError { message, .. } => write!(f, "Logging error: {message}"),
            Self::ServerError { message, .. } => write!(f, "Server error: {message}"),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::LogInitError { source, .. }
            | Self::ServerError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}
