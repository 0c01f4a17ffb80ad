//! Message values accepted by the logger and small shared helpers

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A graphite metric sample
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GraphiteMetric {
    pub path: String,
    pub value: Value,
}

impl GraphiteMetric {
    /// Metric sample at `path`
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// One user-supplied log message
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Plain text, wrapped as the `msg` field
    Text(String),
    /// Structured fields merged over the envelope
    Structured(Map<String, Value>),
    /// Graphite metric pair
    Metric(GraphiteMetric),
}

impl Message {
    /// Convert an arbitrary JSON value; `null` is an absent message
    pub fn from_value(value: Value) -> Option<Message> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Message::Text(text)),
            Value::Object(fields) => Some(Message::Structured(fields)),
            other => Some(Message::Text(other.to_string())),
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<Map<String, Value>> for Message {
    fn from(fields: Map<String, Value>) -> Self {
        Message::Structured(fields)
    }
}

impl From<GraphiteMetric> for Message {
    fn from(metric: GraphiteMetric) -> Self {
        Message::Metric(metric)
    }
}

/// The argument of a single `log` call: one message or a sequence of them.
///
/// `None` entries stand for absent values and cause the call to be rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Messages(Vec<Option<Message>>);

impl Messages {
    /// A single absent message, which `log` rejects
    pub fn none() -> Self {
        Messages(vec![None])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Option<Message>> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Option<Message>> {
        self.0
    }
}

impl From<Message> for Messages {
    fn from(message: Message) -> Self {
        Messages(vec![Some(message)])
    }
}

impl From<Option<Message>> for Messages {
    fn from(message: Option<Message>) -> Self {
        Messages(vec![message])
    }
}

impl From<&str> for Messages {
    fn from(text: &str) -> Self {
        Message::from(text).into()
    }
}

impl From<String> for Messages {
    fn from(text: String) -> Self {
        Message::from(text).into()
    }
}

impl From<GraphiteMetric> for Messages {
    fn from(metric: GraphiteMetric) -> Self {
        Message::from(metric).into()
    }
}

impl From<Map<String, Value>> for Messages {
    fn from(fields: Map<String, Value>) -> Self {
        Message::from(fields).into()
    }
}

impl From<Value> for Messages {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Messages(items.into_iter().map(Message::from_value).collect()),
            other => Messages(vec![Message::from_value(other)]),
        }
    }
}

impl From<Vec<Message>> for Messages {
    fn from(messages: Vec<Message>) -> Self {
        Messages(messages.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Messages {
    fn from(texts: Vec<&str>) -> Self {
        Messages(texts.into_iter().map(|t| Some(Message::from(t))).collect())
    }
}

impl From<Vec<String>> for Messages {
    fn from(texts: Vec<String>) -> Self {
        Messages(texts.into_iter().map(|t| Some(Message::from(t))).collect())
    }
}

impl From<Vec<GraphiteMetric>> for Messages {
    fn from(metrics: Vec<GraphiteMetric>) -> Self {
        Messages(metrics.into_iter().map(|m| Some(Message::from(m))).collect())
    }
}

/// Generate a new session key
pub fn generate_session_key() -> String {
    Uuid::new_v4().to_string()
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Unix seconds, rounding half a second up
pub fn unix_seconds(timestamp: &DateTime<Utc>) -> i64 {
    (timestamp.timestamp_millis() + 500).div_euclid(1000)
}
