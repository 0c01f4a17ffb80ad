//! In-memory transport used by unit tests

use crate::errors::{LoggerError, Result};
use crate::transport::{Transport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Records every request and answers with a configurable outcome.
///
/// A gated transport holds each send open until `release` is called.
pub struct MockTransport {
    requests: Mutex<Vec<TransportRequest>>,
    fail: AtomicBool,
    status: AtomicU16,
    gate: Option<Semaphore>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            status: AtomicU16::new(200),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Let `n` held sends complete
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Bodies split back into lines
    pub fn sent_lines(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .map(|r| r.body.split('\n').map(str::to_string).collect())
            .collect()
    }

    /// Yield to other tasks until `n` sends have started
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.calls() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} transport calls, saw {}", n, self.calls());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| LoggerError::Transport(e.to_string()))?
                .forget();
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(LoggerError::Transport("connection refused".to_string()));
        }

        let status = self.status.load(Ordering::SeqCst);
        let status_text = if status < 300 { "OK" } else { "Service Unavailable" };
        Ok(TransportResponse::new(status, status_text, HashMap::new(), "{}"))
    }
}
