//! Shared application state for API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Shared application state for API handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
    /// Whether recovered panics are logged with stack traces.
    pub include_stack: bool,
    /// Set once graceful shutdown has begun.
    pub draining: Arc<AtomicBool>,
}

impl AppState {
    /// Create a new AppState instance.
    #[must_use]
    pub fn new(include_stack: bool) -> Self {
        Self {
            start_time: SystemTime::now(),
            include_stack,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the server as shutting down.
    pub fn begin_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Whether graceful shutdown has begun.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}
