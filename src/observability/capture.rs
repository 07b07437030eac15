//! In-memory sink for asserting on emitted entries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::entry::{Level, LogEntry};
use super::sink::StructuredLog;

/// Keeps every accepted entry in memory.
///
/// Clones share the same storage, so a test can hand one clone to the
/// interceptors and inspect another.
#[derive(Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    flushes: Arc<AtomicUsize>,
    min_level: Level,
}

impl MemoryLog {
    /// Capture every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture only entries at or above `min_level`.
    #[must_use]
    pub fn with_min_level(min_level: Level) -> Self {
        Self {
            min_level,
            ..Self::default()
        }
    }

    /// Snapshot of the captured entries in emission order.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Captured entries at exactly `level`.
    #[must_use]
    pub fn at_level(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level() == level)
            .collect()
    }

    /// Count captured entries matching a predicate.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries().iter().filter(|e| predicate(e)).count()
    }

    /// Forget every captured entry.
    pub fn clear(&self) {
        self.entries.lock().map(|mut e| e.clear()).ok();
    }

    /// Number of times [`StructuredLog::flush`] was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl StructuredLog for MemoryLog {
    fn emit(&self, entry: LogEntry) {
        if entry.level() < self.min_level {
            return;
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let log = MemoryLog::new();
        let handle = log.clone();

        log.emit(LogEntry::info("/a"));
        log.emit(LogEntry::error("/b"));

        assert_eq!(handle.entries().len(), 2);
        assert_eq!(handle.at_level(Level::Error).len(), 1);

        handle.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_threshold_and_flush() {
        let log = MemoryLog::with_min_level(Level::Info);
        log.emit(LogEntry::debug("dropped"));
        log.emit(LogEntry::info("kept"));
        log.flush();

        assert_eq!(log.count(|e| e.message() == "kept"), 1);
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.flush_count(), 1);
    }
}
