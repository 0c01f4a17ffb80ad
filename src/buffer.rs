//! In-memory queue of serialized lines waiting to be sent

use crate::codec::EncodedLine;
use std::collections::VecDeque;
use tracing::debug;

/// Lines captured when a send starts
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Number of lines at the front of the queue covered by this send
    pub count: usize,
    /// The covered lines joined with newlines
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    count: usize,
    epoch: u64,
}

/// FIFO of encoded lines plus the marker of the send in progress.
///
/// Lines are only ever appended at the back and removed from the front, so a
/// send covers a stable prefix even while more lines are appended behind it.
#[derive(Debug, Default)]
pub struct PendingQueue {
    lines: VecDeque<EncodedLine>,
    body_chars: usize,
    in_flight: Option<InFlight>,
    // bumped on clear so an in-flight send never removes lines queued after it
    epoch: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append lines in call order
    pub fn extend(&mut self, lines: impl IntoIterator<Item = EncodedLine>) {
        for line in lines {
            self.body_chars += line.body_len;
            self.lines.push_back(line);
        }
        debug!(pending = self.lines.len(), "Queued log lines");
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Aggregated body length, counting one separator per line
    pub fn body_len(&self) -> usize {
        self.body_chars + self.lines.len()
    }

    /// True between `begin_send` and `finish_send`
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Serialized lines in queue order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.line.as_str())
    }

    /// Mark a send as started and capture what it covers.
    ///
    /// Returns `None` when a send is already in flight or nothing is queued.
    pub fn begin_send(&mut self) -> Option<Snapshot> {
        if self.in_flight.is_some() || self.lines.is_empty() {
            return None;
        }

        let count = self.lines.len();
        let body = if count == 1 {
            self.lines[0].line.clone()
        } else {
            let mut body = String::with_capacity(self.body_chars + count * 64);
            for (i, line) in self.lines.iter().enumerate() {
                if i > 0 {
                    body.push('\n');
                }
                body.push_str(&line.line);
            }
            body
        };

        self.in_flight = Some(InFlight {
            count,
            epoch: self.epoch,
        });

        Some(Snapshot { count, body })
    }

    /// Clear the in-flight marker.
    ///
    /// When `delivered` is set the covered prefix is removed; otherwise the
    /// queue is left untouched. Returns the number of removed lines.
    pub fn finish_send(&mut self, delivered: bool) -> usize {
        let Some(in_flight) = self.in_flight.take() else {
            return 0;
        };

        if !delivered || in_flight.epoch != self.epoch {
            return 0;
        }

        let count = in_flight.count.min(self.lines.len());
        for line in self.lines.drain(..count) {
            self.body_chars -= line.body_len;
        }

        debug!(removed = count, pending = self.lines.len(), "Removed delivered lines");
        count
    }

    /// Drop every queued line, including those covered by a send in flight
    pub fn clear(&mut self) -> usize {
        let cleared = self.lines.len();
        self.lines.clear();
        self.body_chars = 0;
        self.epoch = self.epoch.wrapping_add(1);

        debug!(cleared, "Cleared pending queue");
        cleared
    }
}
