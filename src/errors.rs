//! Error types for the log shipper

use std::fmt;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug)]
pub enum LoggerError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request failed
    Http(reqwest::Error),

    /// HTTP/1.1 exchange over the socket transport failed
    Hyper(hyper::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// A message passed to `log` was rejected
    Validation(String),

    /// Transport error
    Transport(String),

    /// The transport did not answer in time
    Timeout,

    /// The collection endpoint answered with a non-2xx status
    Status { status: u16, status_text: String },
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::Io(err) => write!(f, "IO error: {}", err),
            LoggerError::Http(err) => write!(f, "HTTP error: {}", err),
            LoggerError::Hyper(err) => write!(f, "HTTP connection error: {}", err),
            LoggerError::Json(err) => write!(f, "JSON error: {}", err),
            LoggerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            LoggerError::Validation(msg) => write!(f, "Invalid message: {}", msg),
            LoggerError::Transport(msg) => write!(f, "Transport error: {}", msg),
            LoggerError::Timeout => write!(f, "Request timeout"),
            LoggerError::Status {
                status,
                status_text,
            } => write!(f, "Endpoint responded with {} {}", status, status_text),
        }
    }
}

impl std::error::Error for LoggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggerError::Io(err) => Some(err),
            LoggerError::Http(err) => Some(err),
            LoggerError::Hyper(err) => Some(err),
            LoggerError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoggerError {
    fn from(err: std::io::Error) -> Self {
        LoggerError::Io(err)
    }
}

impl From<reqwest::Error> for LoggerError {
    fn from(err: reqwest::Error) -> Self {
        LoggerError::Http(err)
    }
}

impl From<hyper::Error> for LoggerError {
    fn from(err: hyper::Error) -> Self {
        LoggerError::Hyper(err)
    }
}

impl From<serde_json::Error> for LoggerError {
    fn from(err: serde_json::Error) -> Self {
        LoggerError::Json(err)
    }
}
