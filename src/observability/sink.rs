//! The structured log capability consumed by the interceptors.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::entry::{Level, LogEntry};

/// Destination for [`LogEntry`] values.
///
/// Implementations own their buffering and durability, must be safe to call
/// from many in-flight requests at once, and never report emission failures
/// back to the caller.
pub trait StructuredLog: Send + Sync {
    /// Deliver one entry, best effort.
    fn emit(&self, entry: LogEntry);

    /// Block until every buffered entry is durable.
    fn flush(&self) {}
}

/// The logging capability as it is injected into interceptors.
pub type SharedLog = Arc<dyn StructuredLog>;

impl<T: StructuredLog + ?Sized> StructuredLog for Arc<T> {
    fn emit(&self, entry: LogEntry) {
        (**self).emit(entry);
    }

    fn flush(&self) {
        (**self).flush();
    }
}

/// Forwards entries to the process-wide `tracing` subscriber.
///
/// Used when no dedicated log file is configured, so request and fault
/// entries show up alongside the rest of the console output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog {
    min_level: Level,
}

impl TracingLog {
    /// Create a sink that drops entries below `min_level`.
    #[must_use]
    pub const fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl StructuredLog for TracingLog {
    fn emit(&self, entry: LogEntry) {
        if entry.level() < self.min_level {
            return;
        }
        let fields = entry.display_fields();
        match entry.level() {
            Level::Debug => debug!(target: "request_guard::events", %fields, "{}", entry.message()),
            Level::Info => info!(target: "request_guard::events", %fields, "{}", entry.message()),
            Level::Error => error!(target: "request_guard::events", %fields, "{}", entry.message()),
        }
    }
}
