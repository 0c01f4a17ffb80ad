//! Encoding of log messages into transport lines

use crate::errors::{LoggerError, Result};
use crate::message::{format_timestamp, unix_seconds, GraphiteMetric, Message, Messages};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

const MISSING_VALUE: &str = "A value must be provided";
const EMPTY_OBJECT: &str = "A non-empty JSON object must be provided";
const MISSING_GRAPHITE_FIELDS: &str =
    "Both \"path\" and \"value\" properties must be provided in the message object to send Graphite metrics";

/// Per-call values stamped onto every encoded line
#[derive(Debug, Clone)]
pub struct EncodeContext<'a> {
    pub timestamp: DateTime<Utc>,
    pub session_key: &'a str,
    pub client_url: &'a str,
    pub raw: bool,
    pub graphite: bool,
}

/// A serialized line and the length of its message body
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedLine {
    pub line: String,
    pub body_len: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextEnvelope<'a> {
    msg: &'a str,
    session_id: &'a str,
    timestamp: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
}

/// Check a `log` argument before anything is encoded
pub fn validate(messages: &Messages, graphite: bool) -> Result<()> {
    if messages.is_empty() {
        return Err(LoggerError::Validation(MISSING_VALUE.to_string()));
    }

    for message in messages.iter() {
        let message = match message {
            None => return Err(LoggerError::Validation(MISSING_VALUE.to_string())),
            Some(Message::Text(text)) if text.is_empty() && messages.len() == 1 => {
                return Err(LoggerError::Validation(MISSING_VALUE.to_string()));
            }
            Some(message) => message,
        };

        if graphite && graphite_parts(message).is_none() {
            return Err(LoggerError::Validation(MISSING_GRAPHITE_FIELDS.to_string()));
        }

        if let Message::Structured(fields) = message {
            if fields.is_empty() {
                return Err(LoggerError::Validation(EMPTY_OBJECT.to_string()));
            }
        }
    }

    Ok(())
}

/// Validate and encode every message of a `log` call
pub fn encode_all(messages: Messages, ctx: &EncodeContext<'_>) -> Result<Vec<EncodedLine>> {
    validate(&messages, ctx.graphite)?;

    messages
        .into_inner()
        .into_iter()
        .flatten()
        .map(|message| encode(&message, ctx))
        .collect()
}

/// Encode one message
pub fn encode(message: &Message, ctx: &EncodeContext<'_>) -> Result<EncodedLine> {
    if ctx.graphite {
        let (path, value) = graphite_parts(message)
            .ok_or_else(|| LoggerError::Validation(MISSING_GRAPHITE_FIELDS.to_string()))?;
        let line = format!("{} {} {}", path, value, unix_seconds(&ctx.timestamp));
        return Ok(body_is_line(line));
    }

    if ctx.raw {
        let line = match message {
            Message::Text(text) => text.clone(),
            Message::Structured(fields) => serde_json::to_string(fields)?,
            Message::Metric(metric) => serde_json::to_string(metric)?,
        };
        return Ok(body_is_line(line));
    }

    let timestamp = format_timestamp(&ctx.timestamp);

    match message {
        Message::Text(text) => {
            let line = serde_json::to_string(&TextEnvelope {
                msg: text,
                session_id: ctx.session_key,
                timestamp: &timestamp,
                url: ctx.client_url,
            })?;
            Ok(EncodedLine {
                line,
                body_len: text.chars().count(),
            })
        }
        Message::Structured(fields) => encode_structured(fields, &timestamp, ctx),
        Message::Metric(metric) => match serde_json::to_value(metric)? {
            Value::Object(fields) => encode_structured(&fields, &timestamp, ctx),
            _ => Err(LoggerError::Validation(MISSING_GRAPHITE_FIELDS.to_string())),
        },
    }
}

fn encode_structured(
    fields: &Map<String, Value>,
    timestamp: &str,
    ctx: &EncodeContext<'_>,
) -> Result<EncodedLine> {
    let mut merged = Map::new();
    merged.insert("sessionId".to_string(), Value::from(ctx.session_key));
    merged.insert("timestamp".to_string(), Value::from(timestamp));
    if !ctx.client_url.is_empty() {
        merged.insert("url".to_string(), Value::from(ctx.client_url));
    }
    // caller's fields win on collision
    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));

    let body_len = match fields.get("msg") {
        Some(Value::String(text)) => text.chars().count(),
        Some(other) => other.to_string().chars().count(),
        None => serde_json::to_string(fields)?.chars().count(),
    };

    Ok(EncodedLine {
        line: serde_json::to_string(&merged)?,
        body_len,
    })
}

fn body_is_line(line: String) -> EncodedLine {
    let body_len = line.chars().count();
    EncodedLine { line, body_len }
}

fn graphite_parts(message: &Message) -> Option<(String, String)> {
    match message {
        Message::Metric(GraphiteMetric { path, value }) => {
            if value.is_null() {
                return None;
            }
            Some((path.clone(), value_to_string(value)))
        }
        Message::Structured(fields) => {
            let path = fields.get("path").filter(|v| !v.is_null())?;
            let value = fields.get("value").filter(|v| !v.is_null())?;
            Some((value_to_string(path), value_to_string(value)))
        }
        Message::Text(_) => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
