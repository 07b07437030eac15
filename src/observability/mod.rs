//! Observability and structured logging infrastructure.
//!
//! Two kinds of output live here:
//!
//! - **Ambient diagnostics** go through the `tracing` framework, set up by
//!   [`init_tracing`]: startup messages, server lifecycle, per-request spans.
//! - **Request and fault entries** go through the [`StructuredLog`]
//!   capability. It is constructed once at startup by
//!   [`build_structured_log`] and injected into the interceptors.
//!
//! # Environment Configuration
//!
//! ```bash
//! # Console verbosity
//! RUST_LOG=request_guard=debug cargo run -- serve
//!
//! # JSON console output for log aggregation
//! LOG_JSON=true cargo run -- serve
//!
//! # Request/fault entries to a daily rotating file, keeping 5 files
//! LOG_FILE=./logs/access.log LOG_ROTATION=daily LOG_MAX_FILES=5 cargo run -- serve
//! ```

mod capture;
mod entry;
mod json;
mod sink;

pub use capture::MemoryLog;
pub use entry::{DisplayFields, FieldValue, Level, LogEntry};
pub use json::JsonLog;
pub use sink::{SharedLog, StructuredLog, TracingLog};

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;
use crate::error::{GuardError, GuardResult};

/// Initialize the tracing subscriber for ambient diagnostics.
///
/// # Arguments
///
/// * `log_level` - Optional filter directive (e.g., "debug"). Ignored when
///   `RUST_LOG` is set.
/// * `json_output` - JSON lines when true, pretty human-readable output
///   otherwise.
///
/// # Defaults
///
/// Without `RUST_LOG` or `log_level`: `info` for this crate and `warn` for
/// dependencies.
///
/// # Errors
///
/// Returns [`GuardError::LogInitError`] if a global subscriber is already
/// installed.
pub fn init_tracing(log_level: Option<String>, json_output: bool) -> GuardResult<()> {
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new("request_guard=info,tower_http=warn,warn")
    };

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| GuardError::log_init("tracing subscriber already set", Some(Box::new(e))))?;

    info!(json_output, "Tracing initialized successfully");

    Ok(())
}

/// Build the [`StructuredLog`] described by `config`.
///
/// A configured log file yields a rolling [`JsonLog`]; otherwise entries
/// are forwarded to the ambient subscriber through [`TracingLog`].
///
/// # Errors
///
/// Returns [`GuardError::LogInitError`] if the log file cannot be opened.
pub fn build_structured_log(config: &LogConfig) -> GuardResult<SharedLog> {
    let log: SharedLog = match config.file() {
        Some(path) => {
            let sink = JsonLog::rolling(path, config.rotation(), config.max_files(), config.level())?;
            info!(
                path = %path.display(),
                rotation = %config.rotation(),
                max_files = config.max_files(),
                level = %config.level(),
                "Structured log writing to rolling file"
            );
            Arc::new(sink)
        }
        None => {
            info!(level = %config.level(), "Structured log forwarding to tracing");
            Arc::new(TracingLog::new(config.level()))
        }
    };
    Ok(log)
}

/// Initialize tracing with test-specific configuration.
///
/// Use this in test modules to see logging output with
/// `cargo test -- --nocapture`.
#[cfg(test)]
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .pretty()
        .try_init();
}
