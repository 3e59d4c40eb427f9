//! Structured log events and the typed value model captured into them

use crate::levels::Level;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;

/// Capability interface for capturing arbitrary application objects.
///
/// Rust has no runtime reflection, so objects opt in by enumerating their
/// readable properties. A failed read is reported as `Err` with the error's
/// description; the serializer writes that text as the property value
/// instead of aborting the event.
pub trait Describable: fmt::Display + Send + Sync {
    fn describe(&self) -> Vec<(String, std::result::Result<EventValue, String>)>;
}

/// A value attached to a log event, either as a positional parameter or a
/// named property.
#[derive(Clone)]
pub enum EventValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Timestamp(DateTime<FixedOffset>),
    Sequence(Vec<EventValue>),
    Map(Vec<(String, EventValue)>),
    Object(Arc<dyn Describable>),
}

impl EventValue {
    /// Scalar values render as JSON literals directly; composites go
    /// through capture-mode handling.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            EventValue::Sequence(_) | EventValue::Map(_) | EventValue::Object(_)
        )
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Null => Ok(()),
            EventValue::Bool(v) => write!(f, "{}", v),
            EventValue::Int(v) => write!(f, "{}", v),
            EventValue::UInt(v) => write!(f, "{}", v),
            EventValue::Float(v) => {
                if v.is_nan() {
                    write!(f, "NaN")
                } else if v.is_infinite() {
                    write!(f, "{}", if *v > 0.0 { "Infinity" } else { "-Infinity" })
                } else {
                    write!(f, "{}", v)
                }
            }
            EventValue::Char(v) => write!(f, "{}", v),
            EventValue::Str(v) => write!(f, "{}", v),
            EventValue::Timestamp(v) => {
                write!(f, "{}", v.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            EventValue::Sequence(items) => {
                let mut delimiter = "";
                for item in items {
                    write!(f, "{}{}", delimiter, item)?;
                    delimiter = ", ";
                }
                Ok(())
            }
            EventValue::Map(entries) => {
                let mut delimiter = "";
                for (key, value) in entries {
                    write!(f, "{}{}={}", delimiter, key, value)?;
                    delimiter = ", ";
                }
                Ok(())
            }
            EventValue::Object(object) => write!(f, "{}", object),
        }
    }
}

// Arc<dyn Describable> blocks the derive.
impl fmt::Debug for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Null => write!(f, "Null"),
            EventValue::Bool(v) => write!(f, "Bool({:?})", v),
            EventValue::Int(v) => write!(f, "Int({:?})", v),
            EventValue::UInt(v) => write!(f, "UInt({:?})", v),
            EventValue::Float(v) => write!(f, "Float({:?})", v),
            EventValue::Char(v) => write!(f, "Char({:?})", v),
            EventValue::Str(v) => write!(f, "Str({:?})", v),
            EventValue::Timestamp(v) => write!(f, "Timestamp({:?})", v),
            EventValue::Sequence(v) => write!(f, "Sequence({:?})", v),
            EventValue::Map(v) => write!(f, "Map({:?})", v),
            EventValue::Object(v) => write!(f, "Object({})", v),
        }
    }
}

impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}

impl From<i32> for EventValue {
    fn from(v: i32) -> Self {
        EventValue::Int(v as i64)
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}

impl From<u32> for EventValue {
    fn from(v: u32) -> Self {
        EventValue::UInt(v as u64)
    }
}

impl From<u64> for EventValue {
    fn from(v: u64) -> Self {
        EventValue::UInt(v)
    }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        EventValue::Float(v)
    }
}

impl From<char> for EventValue {
    fn from(v: char) -> Self {
        EventValue::Char(v)
    }
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::Str(v.to_string())
    }
}

impl From<String> for EventValue {
    fn from(v: String) -> Self {
        EventValue::Str(v)
    }
}

impl From<DateTime<Utc>> for EventValue {
    fn from(v: DateTime<Utc>) -> Self {
        EventValue::Timestamp(v.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for EventValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        EventValue::Timestamp(v)
    }
}

impl From<Vec<EventValue>> for EventValue {
    fn from(v: Vec<EventValue>) -> Self {
        EventValue::Sequence(v)
    }
}

/// One structured log event, as handed to the sink by the host application.
///
/// Read-only to the shipping pipeline; property insertion order is
/// preserved so encoding is deterministic.
#[derive(Clone, Debug)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub parameters: Vec<EventValue>,
    pub properties: Vec<(String, EventValue)>,
    pub error: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            parameters: Vec::new(),
            properties: Vec::new(),
            error: None,
            trace_id: None,
            span_id: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<EventValue>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_trace_context(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    /// Looks up a named property; the first entry wins on duplicates.
    pub fn property(&self, name: &str) -> Option<&EventValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
