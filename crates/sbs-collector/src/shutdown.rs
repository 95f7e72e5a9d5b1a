// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shutdown signalling and per-stage drain acknowledgement.
//!
//! The coordinator broadcasts one cancellation to every stage through a
//! [`ShutdownContext`]. Each stage also holds a [`DrainGuard`]; dropping it
//! acknowledges that the stage has finished its final work. The
//! orchestrator waits for every acknowledgement, bounded by a drain budget.

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pipeline stages that take part in shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SourceReader,
    Batcher,
    SinkWriter,
    FaultReporter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SourceReader => "source reader",
            Stage::Batcher => "batcher",
            Stage::SinkWriter => "sink writer",
            Stage::FaultReporter => "fault reporter",
        };
        f.write_str(name)
    }
}

/// Cancellation view handed to each stage.
#[derive(Debug, Clone)]
pub struct ShutdownContext {
    token: CancellationToken,
}

impl ShutdownContext {
    /// Resolves once shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Acknowledges a stage's drain when dropped.
#[derive(Debug)]
pub struct DrainGuard {
    stage: Stage,
    acks: mpsc::UnboundedSender<Stage>,
}

impl DrainGuard {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        tracing::debug!("{} drained", self.stage);
        let _ = self.acks.send(self.stage);
    }
}

/// Result of waiting for the stages to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Stages that had not acknowledged when the budget ran out.
    pub pending: Vec<Stage>,
    pub elapsed: Duration,
}

impl DrainOutcome {
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Owns the cancellation token and collects drain acknowledgements.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    acks_tx: mpsc::UnboundedSender<Stage>,
    acks_rx: mpsc::UnboundedReceiver<Stage>,
    registered: Vec<Stage>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();
        Self {
            token: CancellationToken::new(),
            acks_tx,
            acks_rx,
            registered: Vec::new(),
        }
    }

    /// Register a stage and hand out its context and drain guard.
    pub fn register(&mut self, stage: Stage) -> (ShutdownContext, DrainGuard) {
        self.registered.push(stage);
        (
            self.context(),
            DrainGuard {
                stage,
                acks: self.acks_tx.clone(),
            },
        )
    }

    /// Context for observers that do not need to acknowledge.
    pub fn context(&self) -> ShutdownContext {
        ShutdownContext {
            token: self.token.clone(),
        }
    }

    /// Broadcast shutdown to every stage.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until every registered stage has acknowledged, or `budget`
    /// elapses, whichever comes first.
    pub async fn wait_drained(&mut self, budget: Duration) -> DrainOutcome {
        let start = Instant::now();
        let deadline = start + budget;
        let mut pending = self.registered.clone();

        while !pending.is_empty() {
            match tokio::time::timeout_at(deadline, self.acks_rx.recv()).await {
                Ok(Some(stage)) => {
                    if let Some(pos) = pending.iter().position(|s| *s == stage) {
                        pending.remove(pos);
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }

        DrainOutcome {
            pending,
            elapsed: start.elapsed(),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
