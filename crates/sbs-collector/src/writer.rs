// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sink writer stage.

use crate::fault::{Fault, FaultSender};
use crate::record::Batch;
use crate::sink::{SinkError, TimeSeriesSink};
use crate::stats::PipelineStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Delivers completed batches to the sink, one at a time.
///
/// Each write is bounded by `write_timeout`. A failed or timed-out batch is
/// reported and discarded; the next batch is attempted normally. The writer
/// does not watch the shutdown signal: it stops when the batcher closes the
/// batch queue, then closes the sink.
pub struct SinkWriter<S> {
    sink: S,
    batches: mpsc::Receiver<Batch>,
    write_timeout: Duration,
    faults: FaultSender,
    stats: Arc<PipelineStats>,
}

impl<S: TimeSeriesSink> SinkWriter<S> {
    pub fn new(
        sink: S,
        batches: mpsc::Receiver<Batch>,
        write_timeout: Duration,
        faults: FaultSender,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            batches,
            write_timeout,
            faults,
            stats,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Sink writer started ({})", self.sink.name());

        while let Some(batch) = self.batches.recv().await {
            let records = batch.len();

            let result =
                match tokio::time::timeout(self.write_timeout, self.sink.write_batch(batch)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::Timeout(self.write_timeout)),
                };

            match result {
                Ok(summary) => {
                    tracing::debug!(
                        "Wrote {} points to {} ({} skipped)",
                        summary.written,
                        self.sink.name(),
                        summary.skipped
                    );
                    self.stats.record_write(summary.written, summary.skipped);
                }
                Err(error) => {
                    self.stats.record_write_failure();
                    self.faults.report(Fault::SinkWrite { records, error });
                }
            }
        }

        match self.sink.close().await {
            Ok(()) => tracing::info!("Sink {} closed", self.sink.name()),
            Err(e) => tracing::error!("Error closing sink {}: {}", self.sink.name(), e),
        }
        tracing::info!("Sink writer stopped");
    }
}
