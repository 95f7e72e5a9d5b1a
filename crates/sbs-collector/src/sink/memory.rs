// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory sink.
//!
//! Keeps every batch it receives and exposes them through a cloneable
//! [`MemorySinkView`]. Failures and slow writes can be scripted, which makes
//! it the standard sink for pipeline tests.

use super::{SinkError, TimeSeriesSink, WriteSummary};
use crate::record::{Batch, Record};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    batches: Vec<Vec<Record>>,
    attempts: usize,
    fail_next: usize,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Records batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    shared: Arc<Shared>,
    delay: Option<Duration>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes.
    pub fn failing_first(self, count: usize) -> Self {
        self.shared.lock().fail_next = count;
        self
    }

    /// Sleep this long inside every write.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn view(&self) -> MemorySinkView {
        MemorySinkView {
            shared: self.shared.clone(),
        }
    }
}

impl TimeSeriesSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_batch(&mut self, batch: Batch) -> Result<WriteSummary, SinkError> {
        self.shared.lock().attempts += 1;
        self.shared.changed.notify_waiters();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.shared.lock();
            if state.closed {
                Err(SinkError::Closed)
            } else if state.fail_next > 0 {
                state.fail_next -= 1;
                Err(SinkError::Io(io::Error::other("injected write failure")))
            } else {
                let written = batch.len();
                state.batches.push(batch.into_records());
                Ok(WriteSummary {
                    written,
                    skipped: 0,
                })
            }
        };

        self.shared.changed.notify_waiters();
        result
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.shared.lock().closed = true;
        self.shared.changed.notify_waiters();
        Ok(())
    }
}

/// Read side of a [`MemorySink`].
#[derive(Debug, Clone)]
pub struct MemorySinkView {
    shared: Arc<Shared>,
}

impl MemorySinkView {
    /// Batches written successfully, in order.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.shared.lock().batches.clone()
    }

    pub fn batch_count(&self) -> usize {
        self.shared.lock().batches.len()
    }

    /// Write calls started, failed ones included.
    pub fn attempts(&self) -> usize {
        self.shared.lock().attempts
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Wait until at least `count` batches have been stored.
    pub async fn wait_for_batches(&self, count: usize) {
        loop {
            let changed = self.shared.changed.notified();
            if self.batch_count() >= count {
                return;
            }
            changed.await;
        }
    }

    /// Wait until at least `count` writes were attempted.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let changed = self.shared.changed.notified();
            if self.attempts() >= count {
                return;
            }
            changed.await;
        }
    }

    /// Wait until the sink has been closed.
    pub async fn wait_closed(&self) {
        loop {
            let changed = self.shared.changed.notified();
            if self.is_closed() {
                return;
            }
            changed.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn batch(hex: &str) -> Batch {
        let now = Utc::now();
        Batch::new(vec![Record::new(hex, now, now)]).unwrap()
    }

    #[tokio::test]
    async fn test_records_batches() {
        let mut sink = MemorySink::new();
        let view = sink.view();

        sink.write_batch(batch("A")).await.unwrap();
        sink.write_batch(batch("B")).await.unwrap();
        view.wait_for_batches(2).await;

        let batches = view.batches();
        assert_eq!(batches[0][0].hex_ident, "A");
        assert_eq!(batches[1][0].hex_ident, "B");

        sink.close().await.unwrap();
        assert!(view.is_closed());
        assert!(matches!(
            sink.write_batch(batch("C")).await,
            Err(SinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mut sink = MemorySink::new().failing_first(1);
        let view = sink.view();

        assert!(sink.write_batch(batch("A")).await.is_err());
        assert!(sink.write_batch(batch("B")).await.is_ok());
        assert_eq!(view.attempts(), 2);
        assert_eq!(view.batch_count(), 1);
    }
}
