//! Public logger combining configuration, encoding and scheduling

use crate::codec::{self, EncodeContext};
use crate::config::{Config, ConfigUpdate, LoggerOptions, PerMessageOptions};
use crate::errors::Result;
use crate::message::Messages;
use crate::scheduler::{FlushOutcome, Scheduler};
use crate::transport::{transport_for, Transport};

use chrono::Utc;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Result of a `log` call
#[derive(Debug)]
pub enum LogOutcome {
    /// The message was invalid or the logger is inert; nothing was queued
    Rejected,
    /// Queued; sending happens later or in the background
    Queued,
    /// Queued and the send it triggered has completed
    Flushed(FlushOutcome),
}

impl LogOutcome {
    /// True unless the call was rejected
    pub fn is_accepted(&self) -> bool {
        !matches!(self, LogOutcome::Rejected)
    }
}

/// Logger statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggerStats {
    pub pending_lines: usize,
    pub pending_body_len: usize,
    pub sending: bool,
    pub timer_active: bool,
    pub session_key: String,
}

/// Buffers log messages and ships them to an HTTP source.
///
/// Construction never fails: without a usable endpoint the logger is inert and
/// every call is a no-op. Dropping the logger cancels its timer.
pub struct Logger {
    scheduler: Option<Scheduler>,
}

impl Logger {
    /// Create a logger using the transport selected in `options`
    pub fn new(options: LoggerOptions) -> Self {
        Self::build(options, None).unwrap_or_else(|e| {
            error!("Logger is disabled: {}", e);
            Self { scheduler: None }
        })
    }

    /// Create a logger posting through a caller-supplied transport
    pub fn with_transport(options: LoggerOptions, transport: Arc<dyn Transport>) -> Self {
        Self::build(options, Some(transport)).unwrap_or_else(|e| {
            error!("Logger is disabled: {}", e);
            Self { scheduler: None }
        })
    }

    fn build(options: LoggerOptions, transport: Option<Arc<dyn Transport>>) -> Result<Self> {
        let config = Config::from_options(options)?;
        let transport = match transport {
            Some(transport) => transport,
            None => transport_for(&config)?,
        };

        debug!(
            session_key = %config.session_key,
            interval_ms = config.interval.as_millis() as u64,
            batch_size = config.batch_size,
            "Created logger"
        );

        let scheduler = Scheduler::new(config, transport);
        scheduler.start_timer();

        Ok(Self {
            scheduler: Some(scheduler),
        })
    }

    /// False when construction found no usable endpoint
    pub fn is_valid(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Queue one message or a sequence of messages.
    ///
    /// Invalid input is reported through `tracing` and yields
    /// `LogOutcome::Rejected` with nothing queued.
    pub async fn log(&self, messages: impl Into<Messages>, options: PerMessageOptions) -> LogOutcome {
        let Some(scheduler) = &self.scheduler else {
            debug!("Ignoring log call on inert logger");
            return LogOutcome::Rejected;
        };

        let config = scheduler.config();
        let session_key = options
            .session_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .unwrap_or(&config.session_key);
        let client_url = options
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&config.client_url);

        let ctx = EncodeContext {
            timestamp: options.timestamp.unwrap_or_else(Utc::now),
            session_key,
            client_url,
            raw: config.raw,
            graphite: config.graphite,
        };

        let lines = match codec::encode_all(messages.into(), &ctx) {
            Ok(lines) => lines,
            Err(e) => {
                error!("{}", e);
                return LogOutcome::Rejected;
            }
        };

        if !scheduler.enqueue(lines) {
            return LogOutcome::Queued;
        }

        if !config.return_promise {
            if let Ok(handle) = Handle::try_current() {
                let scheduler = scheduler.clone();
                handle.spawn(async move {
                    scheduler.flush().await;
                });
                return LogOutcome::Queued;
            }
        }

        LogOutcome::Flushed(scheduler.flush().await)
    }

    /// Send everything pending now
    pub async fn flush(&self) -> FlushOutcome {
        match &self.scheduler {
            Some(scheduler) => scheduler.flush().await,
            None => FlushOutcome::NotSent,
        }
    }

    /// Overwrite the truthy fields of `update`
    pub fn update_config(&self, update: ConfigUpdate) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.update_config(update);
        }
    }

    /// Discard every pending line, including lines of a send that has not
    /// been acknowledged yet. Returns how many lines were discarded.
    pub fn empty_queue(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::empty_queue)
    }

    /// Start or restart interval sending; false when it cannot run
    pub fn start_timer(&self) -> bool {
        self.scheduler.as_ref().is_some_and(Scheduler::start_timer)
    }

    /// Stop interval sending. Size and manual flushes still work
    pub fn stop_timer(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop_timer();
        }
    }

    /// Number of lines waiting to be delivered
    pub fn pending_count(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::pending_count)
    }

    /// Serialized pending lines in queue order
    pub fn pending_lines(&self) -> Vec<String> {
        self.scheduler
            .as_ref()
            .map(Scheduler::pending_lines)
            .unwrap_or_default()
    }

    /// Snapshot of queue and timer state
    pub fn stats(&self) -> LoggerStats {
        let Some(scheduler) = &self.scheduler else {
            return LoggerStats::default();
        };

        LoggerStats {
            pending_lines: scheduler.pending_count(),
            pending_body_len: scheduler.pending_body_len(),
            sending: scheduler.is_sending(),
            timer_active: scheduler.timer_active(),
            session_key: scheduler.config().session_key,
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
