//! Send scheduling: eligibility, flushing and the repeating timer

use crate::buffer::PendingQueue;
use crate::codec::EncodedLine;
use crate::config::{Config, ConfigUpdate};
use crate::errors::LoggerError;
use crate::transport::{Transport, TransportRequest, TransportResponse};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const CLIENT_HEADER: &str = "X-Sumo-Client";
pub const CLIENT_NAME: &str = "sumo-javascript-sdk";
pub const NAME_HEADER: &str = "X-Sumo-Name";
pub const CATEGORY_HEADER: &str = "X-Sumo-Category";
pub const HOST_HEADER: &str = "X-Sumo-Host";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const GRAPHITE_CONTENT_TYPE: &str = "application/vnd.sumologic.graphite";

/// Result of one flush attempt
#[derive(Debug)]
pub enum FlushOutcome {
    /// A send was already in flight or nothing was queued
    NotSent,
    /// The endpoint answered; the covered lines left the queue
    Delivered(TransportResponse),
    /// The transport failed; the queue is unchanged
    Failed(LoggerError),
}

impl FlushOutcome {
    /// True when the endpoint answered, whatever the status
    pub fn is_delivered(&self) -> bool {
        matches!(self, FlushOutcome::Delivered(_))
    }

    /// The endpoint's response, if it answered
    pub fn response(&self) -> Option<&TransportResponse> {
        match self {
            FlushOutcome::Delivered(response) => Some(response),
            _ => None,
        }
    }
}

/// Owns the pending queue of one logger and decides when it is sent.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: RwLock<Config>,
    queue: Mutex<PendingQueue>,
    transport: Arc<dyn Transport>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerInner {
    fn queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker even when the flush future is dropped mid-send
struct SendGuard<'a> {
    inner: &'a SchedulerInner,
    finished: bool,
}

impl SendGuard<'_> {
    fn finish(mut self, delivered: bool) -> usize {
        self.finished = true;
        self.inner.queue().finish_send(delivered)
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.queue().finish_send(false);
        }
    }
}

/// Headers for the current configuration; optional ones only when set
pub fn build_headers(config: &Config) -> Vec<(String, String)> {
    let content_type = if config.graphite {
        GRAPHITE_CONTENT_TYPE
    } else {
        JSON_CONTENT_TYPE
    };

    let mut headers = vec![
        (CLIENT_HEADER.to_string(), CLIENT_NAME.to_string()),
        ("Content-Type".to_string(), content_type.to_string()),
    ];

    if !config.source_name.is_empty() {
        headers.push((NAME_HEADER.to_string(), config.source_name.clone()));
    }
    if !config.source_category.is_empty() {
        headers.push((CATEGORY_HEADER.to_string(), config.source_category.clone()));
    }
    if !config.host_name.is_empty() {
        headers.push((HOST_HEADER.to_string(), config.host_name.clone()));
    }

    headers
}

impl Scheduler {
    /// Create a scheduler; the timer is not started
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config: RwLock::new(config),
                queue: Mutex::new(PendingQueue::new()),
                transport,
                timer: Mutex::new(None),
            }),
        }
    }

    /// Copy of the current configuration
    pub fn config(&self) -> Config {
        self.inner.config().clone()
    }

    /// Apply a partial update, re-arming the timer when the interval changed
    pub fn update_config(&self, update: ConfigUpdate) {
        let rearm = {
            let mut config = self.inner.config.write().unwrap_or_else(PoisonError::into_inner);
            config.apply_update(update)
        };

        if rearm {
            self.start_timer();
        }
    }

    /// Append encoded lines and report whether a send should start now
    pub fn enqueue(&self, lines: Vec<EncodedLine>) -> bool {
        let ready = {
            let mut queue = self.inner.queue();
            queue.extend(lines);

            if queue.is_sending() {
                return false;
            }

            let config = self.inner.config();
            batch_ready(&queue, &config)
        };

        if ready == Readiness::SizeReached {
            // restarted after the next successful send
            self.stop_timer();
        }

        ready != Readiness::Wait
    }

    /// Send everything queued right now in a single request
    pub async fn flush(&self) -> FlushOutcome {
        let (count, request) = {
            let mut queue = self.inner.queue();
            let Some(snapshot) = queue.begin_send() else {
                return FlushOutcome::NotSent;
            };

            let config = self.inner.config();
            let request = TransportRequest {
                url: config.endpoint.clone(),
                headers: build_headers(&config),
                body: snapshot.body,
            };
            (snapshot.count, request)
        };

        let guard = SendGuard {
            inner: &self.inner,
            finished: false,
        };

        debug!(lines = count, "Sending batch");
        let result = self.inner.transport.send(request).await;

        match result {
            Ok(response) => {
                let removed = guard.finish(true);
                let (interval, on_success, on_error) = {
                    let config = self.inner.config();
                    (config.interval, config.on_success.clone(), config.on_error.clone())
                };

                if !interval.is_zero() {
                    self.start_timer();
                }

                if response.is_success() {
                    debug!(removed, status = response.status, "Batch delivered");
                    if let Some(on_success) = on_success {
                        on_success();
                    }
                } else {
                    let err = LoggerError::Status {
                        status: response.status,
                        status_text: response.status_text.clone(),
                    };
                    warn!(removed, status = response.status, "Endpoint rejected batch: {}", err);
                    if let Some(on_error) = on_error {
                        on_error(&err);
                    }
                }

                FlushOutcome::Delivered(response)
            }
            Err(err) => {
                guard.finish(false);
                warn!(lines = count, "Failed to send batch: {}", err);

                let on_error = self.inner.config().on_error.clone();
                if let Some(on_error) = on_error {
                    on_error(&err);
                }

                FlushOutcome::Failed(err)
            }
        }
    }

    /// Start (or restart) the repeating timer at the configured interval.
    ///
    /// Returns false when the interval is zero or no tokio runtime is running.
    pub fn start_timer(&self) -> bool {
        let period = self.inner.config().interval;
        if period.is_zero() {
            self.stop_timer();
            return false;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available, interval sending is disabled");
                return false;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let task = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let scheduler = Scheduler { inner };
                // detached so restarting the timer never cancels a send
                tokio::spawn(async move {
                    scheduler.flush().await;
                });
            }
        });

        if let Some(previous) = self.inner.timer().replace(task) {
            previous.abort();
        }

        info!(interval_ms = period.as_millis() as u64, "Started interval sending");
        true
    }

    /// Cancel the repeating timer, if any
    pub fn stop_timer(&self) {
        if let Some(task) = self.inner.timer().take() {
            task.abort();
            debug!("Stopped interval sending");
        }
    }

    /// Whether a repeating timer is currently armed
    pub fn timer_active(&self) -> bool {
        self.inner
            .timer()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Drop every pending line; returns how many were discarded
    pub fn empty_queue(&self) -> usize {
        self.inner.queue().clear()
    }

    /// Lines queued, including any in flight
    pub fn pending_count(&self) -> usize {
        self.inner.queue().len()
    }

    /// Accumulated body length used for size gating
    pub fn pending_body_len(&self) -> usize {
        self.inner.queue().body_len()
    }

    /// True while a send is in flight
    pub fn is_sending(&self) -> bool {
        self.inner.queue().is_sending()
    }

    /// Serialized pending lines in queue order
    pub fn pending_lines(&self) -> Vec<String> {
        self.inner.queue().lines().map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Wait,
    EveryLog,
    SizeReached,
}

fn batch_ready(queue: &PendingQueue, config: &Config) -> Readiness {
    if config.use_interval_only {
        return Readiness::Wait;
    }

    if config.batch_size == 0 {
        return if config.interval.is_zero() {
            Readiness::EveryLog
        } else {
            Readiness::Wait
        };
    }

    if queue.body_len() >= config.batch_size {
        Readiness::SizeReached
    } else {
        Readiness::Wait
    }
}
