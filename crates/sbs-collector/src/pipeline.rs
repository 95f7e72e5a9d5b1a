// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipeline orchestration.
//!
//! ```text
//! SourceReader --lines (drop newest)--> Batcher --batches (blocking)--> SinkWriter --> sink
//!       \                                  |                               /
//!        +-------------- faults -----------+------------------------------+--> FaultReporter
//! ```
//!
//! Each stage runs as its own task and owns its end of the queues. Shutdown
//! cancels the source and the batcher; the batcher's final flush closes the
//! batch queue, which stops the writer, which releases the last fault
//! sender, which stops the reporter.

use crate::batcher::Batcher;
use crate::config::{
    BatchConfig, SourceConfig, DRAIN_MARGIN, FAULT_QUEUE_CAPACITY, WRITE_TIMEOUT,
};
use crate::fault::{self, FaultSummary};
use crate::shutdown::{DrainOutcome, ShutdownCoordinator, Stage};
use crate::sink::TimeSeriesSink;
use crate::source::{SourceError, SourceReader};
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::writer::SinkWriter;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// Stage settings for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub batch: BatchConfig,
    /// Upper bound for each sink write.
    pub write_timeout: Duration,
    pub fault_queue_capacity: usize,
    /// Added on top of the longest stage wait to bound shutdown.
    pub drain_margin: Duration,
}

impl PipelineConfig {
    pub fn new(source: SourceConfig, batch: BatchConfig) -> Self {
        Self {
            source,
            batch,
            write_timeout: WRITE_TIMEOUT,
            fault_queue_capacity: FAULT_QUEUE_CAPACITY,
            drain_margin: DRAIN_MARGIN,
        }
    }

    /// Longest time shutdown waits for the stages, plus the margin.
    ///
    /// Covers a sink write already in flight followed by the final drain
    /// write, each bounded by `write_timeout`, and is never shorter than one
    /// batch interval.
    pub fn drain_budget(&self) -> Duration {
        let writes = self.write_timeout.saturating_mul(2);
        self.batch.interval.max(writes) + self.drain_margin
    }
}

/// Pipeline errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{stage} task failed: {reason}")]
    Task { stage: Stage, reason: String },
}

/// A configured, not yet running pipeline.
pub struct Pipeline<S> {
    config: PipelineConfig,
    sink: S,
}

impl<S: TimeSeriesSink> Pipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// Spawn every stage on the current tokio runtime.
    pub fn start(self) -> PipelineHandle {
        let Pipeline { config, sink } = self;
        let drain_budget = config.drain_budget();

        let stats = Arc::new(PipelineStats::new());
        let mut coordinator = ShutdownCoordinator::new();

        let (line_tx, line_rx) = mpsc::channel(config.source.line_queue_capacity.max(1));
        let (batch_tx, batch_rx) = mpsc::channel(config.batch.queue_capacity.max(1));
        let (flush_tx, flush_rx) = mpsc::channel(1);
        let (faults, reporter) = fault::channel(config.fault_queue_capacity);

        tracing::info!(
            "Starting pipeline: source {}, batches of {} every {:?}",
            config.source.address(),
            config.batch.size,
            config.batch.interval
        );

        let (_, guard) = coordinator.register(Stage::FaultReporter);
        let reporter = tokio::spawn(async move {
            let _guard = guard;
            reporter.run().await
        });

        let (_, guard) = coordinator.register(Stage::SinkWriter);
        let writer = SinkWriter::new(
            sink,
            batch_rx,
            config.write_timeout,
            faults.clone(),
            stats.clone(),
        );
        let writer = tokio::spawn(async move {
            let _guard = guard;
            writer.run().await
        });

        let (ctx, guard) = coordinator.register(Stage::Batcher);
        let batcher = Batcher::new(
            config.batch,
            line_rx,
            batch_tx,
            flush_rx,
            faults.clone(),
            stats.clone(),
            ctx,
        );
        let batcher = tokio::spawn(async move {
            let _guard = guard;
            batcher.run().await
        });

        let (ctx, guard) = coordinator.register(Stage::SourceReader);
        let source = SourceReader::new(config.source, line_tx, faults, stats.clone(), ctx);
        let source = tokio::spawn(async move {
            let _guard = guard;
            source.run().await
        });

        PipelineHandle {
            coordinator,
            flush_tx,
            stats,
            drain_budget,
            source: Some(source),
            source_result: None,
            batcher,
            writer,
            reporter,
        }
    }
}

/// Control handle for a running pipeline.
pub struct PipelineHandle {
    coordinator: ShutdownCoordinator,
    flush_tx: mpsc::Sender<()>,
    stats: Arc<PipelineStats>,
    drain_budget: Duration,
    source: Option<JoinHandle<Result<(), SourceError>>>,
    source_result: Option<Result<(), PipelineError>>,
    batcher: JoinHandle<()>,
    writer: JoinHandle<()>,
    reporter: JoinHandle<FaultSummary>,
}

impl PipelineHandle {
    /// Ask the batcher to flush what it holds. Requests made while one is
    /// already pending are merged.
    pub fn flush(&self) {
        let _ = self.flush_tx.try_send(());
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolves when the source reader has stopped on its own, which only
    /// happens when its retry budget is exhausted. Cancel-safe.
    pub async fn source_stopped(&mut self) {
        if let Some(task) = self.source.as_mut() {
            let joined = task.await;
            self.source = None;
            self.source_result = Some(source_outcome(joined));
        }
    }

    /// Broadcast shutdown and wait for every stage to drain, bounded by the
    /// drain budget. Stages still running afterwards are aborted.
    pub async fn shutdown(mut self) -> PipelineReport {
        tracing::info!("Initiating graceful shutdown...");
        self.coordinator.trigger();
        drop(self.flush_tx);

        let drain = self.coordinator.wait_drained(self.drain_budget).await;
        if drain.is_drained() {
            tracing::info!("All stages drained in {:?}", drain.elapsed);
        } else {
            tracing::warn!(
                "Stages still running after {:?}: {:?}",
                self.drain_budget,
                drain.pending
            );
        }

        let source_result = match (self.source_result.take(), self.source.take()) {
            (Some(result), _) => result,
            (None, Some(task)) => {
                source_outcome(finish(Stage::SourceReader, task, &drain).await)
            }
            (None, None) => Ok(()),
        };
        let _ = finish(Stage::Batcher, self.batcher, &drain).await;
        let _ = finish(Stage::SinkWriter, self.writer, &drain).await;
        let faults = finish(Stage::FaultReporter, self.reporter, &drain)
            .await
            .unwrap_or_default();

        let stats = self.stats.snapshot();
        tracing::info!("Pipeline stopped: {}", stats);

        PipelineReport {
            stats,
            faults,
            drain,
            source_result,
        }
    }
}

/// Final state of a pipeline after shutdown.
#[derive(Debug)]
pub struct PipelineReport {
    pub stats: StatsSnapshot,
    pub faults: FaultSummary,
    pub drain: DrainOutcome,
    /// `Err` when the source stopped because its retry budget ran out.
    pub source_result: Result<(), PipelineError>,
}

/// Join a stage task, aborting it first if it missed the drain budget.
async fn finish<T>(
    stage: Stage,
    task: JoinHandle<T>,
    drain: &DrainOutcome,
) -> Result<T, JoinError> {
    if drain.pending.contains(&stage) {
        tracing::warn!("Aborting {}", stage);
        task.abort();
    }
    let joined = task.await;
    if let Err(e) = &joined {
        if !e.is_cancelled() {
            tracing::error!("{} task failed: {}", stage, e);
        }
    }
    joined
}

fn source_outcome(joined: Result<Result<(), SourceError>, JoinError>) -> Result<(), PipelineError> {
    match joined {
        Ok(result) => result.map_err(PipelineError::from),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(PipelineError::Task {
            stage: Stage::SourceReader,
            reason: e.to_string(),
        }),
    }
}
