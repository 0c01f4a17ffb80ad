//! Sumo Logic Log Shipper Library
//!
//! This library buffers application log messages and forwards them in
//! batches to a Sumo Logic HTTP source.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod errors;
pub mod logger;
pub mod logging;
pub mod message;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{ConfigUpdate, LoggerOptions, PerMessageOptions, TransportKind};
pub use errors::{LoggerError, Result};
pub use logger::{LogOutcome, Logger, LoggerStats};
pub use message::{GraphiteMetric, Message, Messages};
pub use scheduler::FlushOutcome;
pub use transport::{HttpTransport, SocketTransport, Transport, TransportRequest, TransportResponse};
