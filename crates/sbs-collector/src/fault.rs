// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Central fault reporting.
//!
//! Stages push [`Fault`]s through a cloned [`FaultSender`]; one
//! [`FaultReporter`] task logs them. Reporting never blocks a stage. When
//! the queue is full a warning is counted and discarded, while an error is
//! logged on the spot and still counted in the summary. The reporter stops
//! once every sender is gone, so it always outlives the stages it serves.

use crate::decoder::{DecodeError, FieldWarning};
use crate::sink::SinkError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// How a fault is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// An asynchronous error signal from a pipeline stage.
#[derive(Debug)]
pub enum Fault {
    /// The raw-line queue was full and newest lines were dropped:
    /// `dropped` since the previous report, `total` since start.
    LineDropped { dropped: u64, total: u64 },
    /// A line had too few fields to decode.
    MalformedLine(DecodeError),
    /// A record was produced with a field left absent or substituted.
    FieldDegraded {
        hex_ident: String,
        warning: FieldWarning,
    },
    /// A connection attempt failed; another follows after `retry_in`.
    ConnectFailed {
        address: String,
        attempt: u32,
        reason: String,
        retry_in: Duration,
    },
    /// An established connection ended; reconnecting after `retry_in`.
    ConnectionLost {
        address: String,
        reason: String,
        retry_in: Duration,
    },
    /// The source gave up and stopped producing lines.
    SourceFatal { reason: String },
    /// A batch could not be written and was discarded.
    SinkWrite { records: usize, error: SinkError },
}

impl Fault {
    pub fn severity(&self) -> Severity {
        match self {
            Fault::SourceFatal { .. } | Fault::SinkWrite { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::LineDropped { dropped, total } => write!(
                f,
                "raw line queue full, dropped {} newest lines ({} dropped so far)",
                dropped, total
            ),
            Fault::MalformedLine(e) => write!(f, "{}", e),
            Fault::FieldDegraded { hex_ident, warning } => {
                write!(f, "{}: {}", hex_ident, warning)
            }
            Fault::ConnectFailed {
                address,
                attempt,
                reason,
                retry_in,
            } => write!(
                f,
                "connection to {} failed (attempt {}): {}; retrying in {:?}",
                address, attempt, reason, retry_in
            ),
            Fault::ConnectionLost {
                address,
                reason,
                retry_in,
            } => write!(
                f,
                "connection to {} lost: {}; reconnecting in {:?}",
                address, reason, retry_in
            ),
            Fault::SourceFatal { reason } => write!(f, "source stopped: {}", reason),
            Fault::SinkWrite { records, error } => write!(
                f,
                "time-series write of {} records failed, batch discarded: {}",
                records, error
            ),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    overflowed: AtomicU64,
    logged_inline: AtomicU64,
}

/// Create a fault queue of the given capacity.
pub fn channel(capacity: usize) -> (FaultSender, FaultReporter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(Counters::default());
    (
        FaultSender {
            tx,
            counters: counters.clone(),
        },
        FaultReporter { rx, counters },
    )
}

/// Non-blocking handle for reporting faults.
#[derive(Debug, Clone)]
pub struct FaultSender {
    tx: mpsc::Sender<Fault>,
    counters: Arc<Counters>,
}

impl FaultSender {
    pub fn report(&self, fault: Fault) {
        let fault = match self.tx.try_send(fault) {
            Ok(()) => return,
            Err(TrySendError::Full(fault)) | Err(TrySendError::Closed(fault)) => fault,
        };

        match fault.severity() {
            Severity::Error => {
                self.counters.logged_inline.fetch_add(1, Ordering::Relaxed);
                tracing::error!("{}", fault);
            }
            Severity::Warning => {
                self.counters.overflowed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("fault queue unavailable, discarding: {}", fault);
            }
        }
    }
}

/// Totals logged by a [`FaultReporter`] over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultSummary {
    pub warnings: u64,
    /// Errors logged, including those logged by the sender on a full queue.
    pub errors: u64,
    /// Warnings discarded because the queue was full.
    pub overflowed: u64,
}

/// Logs every reported fault until all senders are dropped.
#[derive(Debug)]
pub struct FaultReporter {
    rx: mpsc::Receiver<Fault>,
    counters: Arc<Counters>,
}

impl FaultReporter {
    pub async fn run(mut self) -> FaultSummary {
        let mut summary = FaultSummary::default();

        while let Some(fault) = self.rx.recv().await {
            match fault.severity() {
                Severity::Warning => {
                    summary.warnings += 1;
                    tracing::warn!("{}", fault);
                }
                Severity::Error => {
                    summary.errors += 1;
                    tracing::error!("{}", fault);
                }
            }
        }

        summary.errors += self.counters.logged_inline.load(Ordering::Relaxed);
        summary.overflowed = self.counters.overflowed.load(Ordering::Relaxed);
        if summary.overflowed > 0 {
            tracing::warn!("{} warnings discarded on a full queue", summary.overflowed);
        }
        tracing::info!("Fault reporter stopped");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_counts_by_severity() {
        let (sender, reporter) = channel(16);
        let handle = tokio::spawn(reporter.run());

        sender.report(Fault::LineDropped {
            dropped: 1,
            total: 1,
        });
        sender.report(Fault::ConnectionLost {
            address: "localhost:30003".into(),
            reason: "closed by remote".into(),
            retry_in: Duration::from_secs(5),
        });
        sender.report(Fault::SinkWrite {
            records: 5,
            error: SinkError::Timeout(Duration::from_secs(10)),
        });
        drop(sender);

        let summary = handle.await.unwrap();
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.overflowed, 0);
    }

    #[tokio::test]
    async fn test_full_queue_never_blocks() {
        let (sender, reporter) = channel(2);
        for total in 1..=5 {
            sender.report(Fault::LineDropped { dropped: 1, total });
        }
        drop(sender);

        let summary = reporter.run().await;
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.overflowed, 3);
    }

    #[tokio::test]
    async fn test_errors_survive_full_queue() {
        let (sender, reporter) = channel(2);
        for total in 1..=2 {
            sender.report(Fault::LineDropped { dropped: 1, total });
        }
        sender.report(Fault::SinkWrite {
            records: 50,
            error: SinkError::Timeout(Duration::from_secs(10)),
        });
        sender.report(Fault::SourceFatal {
            reason: "retries exhausted".into(),
        });
        drop(sender);

        let summary = reporter.run().await;
        assert_eq!(
            summary,
            FaultSummary {
                warnings: 2,
                errors: 2,
                overflowed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_errors_logged_after_reporter_gone() {
        let (sender, reporter) = channel(4);
        let counters = reporter.counters.clone();
        drop(reporter);

        sender.report(Fault::SourceFatal {
            reason: "retries exhausted".into(),
        });
        sender.report(Fault::LineDropped {
            dropped: 1,
            total: 1,
        });
        assert_eq!(counters.logged_inline.load(Ordering::Relaxed), 1);
        assert_eq!(counters.overflowed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_reporter_waits_for_every_sender() {
        let (sender, reporter) = channel(4);
        let late = sender.clone();
        drop(sender);

        let handle = tokio::spawn(reporter.run());
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        late.report(Fault::SourceFatal {
            reason: "retries exhausted".into(),
        });
        drop(late);
        assert_eq!(handle.await.unwrap().errors, 1);
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::ConnectFailed {
            address: "localhost:30003".into(),
            attempt: 2,
            reason: "connection refused".into(),
            retry_in: Duration::from_secs(5),
        };
        assert_eq!(
            fault.to_string(),
            "connection to localhost:30003 failed (attempt 2): connection refused; retrying in 5s"
        );
        assert_eq!(fault.severity(), Severity::Warning);

        let fault = Fault::LineDropped {
            dropped: 12,
            total: 40,
        };
        assert_eq!(
            fault.to_string(),
            "raw line queue full, dropped 12 newest lines (40 dropped so far)"
        );
    }
}
