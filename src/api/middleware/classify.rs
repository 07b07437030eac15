//! Classification of panic payloads caught by the recovery boundary.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io;

/// What kind of fault reached the recovery boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The peer went away mid-request. Expected, logged without a stack.
    BrokenConnection,
    /// Any other panic. Treated as a defect and answered with a 500.
    Generic,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BrokenConnection => "broken_connection",
            Self::Generic => "generic",
        })
    }
}

/// Classify a panic payload.
///
/// A payload is a broken connection when it is an error (`io::Error` or a
/// boxed `Error + Send + Sync`) whose source chain contains an `io::Error`
/// mentioning a broken pipe or a reset connection. String payloads from
/// `panic!` are always generic.
#[must_use]
pub fn classify(payload: &(dyn Any + Send)) -> FaultKind {
    match payload_error(payload) {
        Some(err) if is_broken_connection(err) => FaultKind::BrokenConnection,
        _ => FaultKind::Generic,
    }
}

/// Whether `err` or any of its sources is a peer-disconnect I/O error.
#[must_use]
pub fn is_broken_connection(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if mentions_disconnect(&io_err.to_string()) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn mentions_disconnect(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("broken pipe") || message.contains("connection reset by peer")
}

fn payload_error(payload: &(dyn Any + Send)) -> Option<&(dyn Error + 'static)> {
    if let Some(err) = payload.downcast_ref::<io::Error>() {
        return Some(err);
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        return Some(err.as_ref());
    }
    None
}

/// Human-readable rendering of a panic payload for the `error` field.
#[must_use]
pub fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(err) = payload_error(payload) {
        return err.to_string();
    }
    "Box<dyn Any>".to_string()
}
