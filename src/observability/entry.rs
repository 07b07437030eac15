//! Leveled, field-tagged log entries.
//!
//! A [`LogEntry`] is built once by the emitting interceptor and handed by
//! value to a [`StructuredLog`](super::StructuredLog). Builder methods
//! consume the entry, so it cannot be changed after it has been passed on.
//!
//! ```
//! use request_guard::observability::{FieldValue, Level, LogEntry};
//! use std::time::Duration;
//!
//! let entry = LogEntry::info("/hello")
//!     .with_int("status", 200)
//!     .with_str("path", "/hello")
//!     .with_duration("cost", Duration::from_millis(3));
//!
//! assert_eq!(entry.level(), Level::Info);
//! assert_eq!(entry.field("status"), Some(&FieldValue::Int(200)));
//! ```

use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::GuardError;

/// Severity of a [`LogEntry`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Verbose diagnostics.
    #[default]
    Debug,
    /// Routine events such as completed requests.
    Info,
    /// Faults and failures.
    Error,
}

impl Level {
    /// Lowercase name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "error" => Ok(Self::Error),
            other => Err(GuardError::config(
                format!("unknown log level '{other}', expected debug, info or error"),
                None,
            )),
        }
    }
}

/// Value attached to a named field of a [`LogEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free-form text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Elapsed time.
    Duration(Duration),
    /// Rendered error or panic payload.
    Error(String),
}

impl FieldValue {
    /// Text content of `Str` and `Error` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Error(s) => Some(s),
            Self::Int(_) | Self::Duration(_) => None,
        }
    }

    /// Integer content of an `Int` value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Duration content of a `Duration` value.
    #[must_use]
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// JSON form of the value. Durations are encoded as seconds.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) | Self::Error(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Duration(d) => Value::from(d.as_secs_f64()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) | Self::Error(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Duration(d) => write!(f, "{d:?}"),
        }
    }
}

/// One structured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    level: Level,
    message: String,
    caller: &'static Location<'static>,
    fields: Vec<(&'static str, FieldValue)>,
}

impl LogEntry {
    /// Create an entry without fields, annotated with the calling source line.
    #[must_use]
    #[track_caller]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            caller: Location::caller(),
            fields: Vec::new(),
        }
    }

    /// Create a `debug` entry.
    #[must_use]
    #[track_caller]
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Level::Debug, message)
    }

    /// Create an `info` entry.
    #[must_use]
    #[track_caller]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    /// Create an `error` entry.
    #[must_use]
    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    /// Append a field. Fields keep insertion order.
    #[must_use]
    pub fn with_field(mut self, name: &'static str, value: FieldValue) -> Self {
        self.fields.push((name, value));
        self
    }

    /// Append a text field.
    #[must_use]
    pub fn with_str(self, name: &'static str, value: impl Into<String>) -> Self {
        self.with_field(name, FieldValue::Str(value.into()))
    }

    /// Append an integer field.
    #[must_use]
    pub fn with_int(self, name: &'static str, value: i64) -> Self {
        self.with_field(name, FieldValue::Int(value))
    }

    /// Append a duration field.
    #[must_use]
    pub fn with_duration(self, name: &'static str, value: Duration) -> Self {
        self.with_field(name, FieldValue::Duration(value))
    }

    /// Append an error field rendered with `Display`.
    #[must_use]
    pub fn with_error(self, name: &'static str, value: impl fmt::Display) -> Self {
        self.with_field(name, FieldValue::Error(value.to_string()))
    }

    /// Severity of the entry.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Entry message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source line that built the entry.
    #[must_use]
    pub const fn caller(&self) -> &'static Location<'static> {
        self.caller
    }

    /// All fields in insertion order.
    #[must_use]
    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    /// First field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Whether a field with the given name is present.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// JSON object for this entry stamped with `timestamp`.
    ///
    /// Keys are `ts`, `level`, `caller` (`file:line`), `msg`, then every
    /// field in order.
    #[must_use]
    pub fn to_json(&self, timestamp: DateTime<Utc>) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 4);
        object.insert(
            "ts".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        object.insert(
            "level".to_string(),
            Value::String(self.level.as_str().to_ascii_uppercase()),
        );
        object.insert(
            "caller".to_string(),
            Value::String(format!("{}:{}", self.caller.file(), self.caller.line())),
        );
        object.insert("msg".to_string(), Value::String(self.message.clone()));
        for (name, value) in &self.fields {
            object.insert((*name).to_string(), value.to_json());
        }
        Value::Object(object)
    }

    /// `name=value` rendering of the fields, space separated.
    #[must_use]
    pub fn display_fields(&self) -> DisplayFields<'_> {
        DisplayFields(&self.fields)
    }
}

/// Display adapter returned by [`LogEntry::display_fields`].
pub struct DisplayFields<'a>(&'a [(&'static str, FieldValue)]);

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
