// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record batching.
//!
//! One event loop decodes raw lines inline and closes batches on three
//! triggers:
//! - size: the buffer reaches `BatchConfig::size`
//! - time: `BatchConfig::interval` elapsed since the last flush
//! - drain: flush request, end of input, or shutdown
//!
//! Every flush restarts the interval. An empty buffer never produces a
//! batch. Completed batches go to the sink writer with a blocking send, so
//! a slow sink pushes back on this stage rather than losing batches.

use crate::config::BatchConfig;
use crate::decoder::{self, Decoded};
use crate::fault::{Fault, FaultSender};
use crate::record::{Batch, Record};
use crate::shutdown::ShutdownContext;
use crate::stats::{FlushTrigger, PipelineStats};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Accumulates records until the batch is full.
#[derive(Debug)]
pub struct BatchBuffer {
    records: Vec<Record>,
    max_size: usize,
}

impl BatchBuffer {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: Vec::with_capacity(max_size),
            max_size,
        }
    }

    /// Add a record. Returns the completed batch once the buffer is full.
    pub fn add(&mut self, record: Record) -> Option<Batch> {
        self.records.push(record);
        if self.records.len() >= self.max_size {
            self.take()
        } else {
            None
        }
    }

    /// Take whatever is buffered. `None` when empty.
    pub fn take(&mut self) -> Option<Batch> {
        let records = std::mem::replace(&mut self.records, Vec::with_capacity(self.max_size));
        Batch::new(records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Decodes raw lines and groups records into batches.
pub struct Batcher {
    config: BatchConfig,
    lines: mpsc::Receiver<String>,
    batches: mpsc::Sender<Batch>,
    flush_requests: mpsc::Receiver<()>,
    faults: FaultSender,
    stats: Arc<PipelineStats>,
    shutdown: ShutdownContext,
}

impl Batcher {
    pub fn new(
        config: BatchConfig,
        lines: mpsc::Receiver<String>,
        batches: mpsc::Sender<Batch>,
        flush_requests: mpsc::Receiver<()>,
        faults: FaultSender,
        stats: Arc<PipelineStats>,
        shutdown: ShutdownContext,
    ) -> Self {
        Self {
            config,
            lines,
            batches,
            flush_requests,
            faults,
            stats,
            shutdown,
        }
    }

    /// Run until shutdown or end of input. Always ends with one final
    /// flush of the remainder, then closes the batch queue.
    pub async fn run(mut self) {
        let mut buffer = BatchBuffer::new(self.config.size);
        let mut ticker = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut requests_open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Batcher draining queued lines");
                    self.lines.close();
                    while let Some(line) = self.lines.recv().await {
                        if !self.ingest(&mut buffer, &mut ticker, line).await {
                            break;
                        }
                    }
                    self.flush(&mut buffer, &mut ticker, FlushTrigger::Drain).await;
                    break;
                }

                request = self.flush_requests.recv(), if requests_open => match request {
                    Some(()) => {
                        if !self.flush(&mut buffer, &mut ticker, FlushTrigger::Request).await {
                            break;
                        }
                    }
                    None => requests_open = false,
                },

                _ = ticker.tick() => {
                    if !self.flush(&mut buffer, &mut ticker, FlushTrigger::Interval).await {
                        break;
                    }
                }

                line = self.lines.recv() => match line {
                    Some(line) => {
                        if !self.ingest(&mut buffer, &mut ticker, line).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("Line queue closed, flushing remainder");
                        self.flush(&mut buffer, &mut ticker, FlushTrigger::Drain).await;
                        break;
                    }
                },
            }
        }

        tracing::info!("Batcher stopped");
    }

    /// Decode one line into the buffer. Returns `false` once the batch
    /// queue is closed.
    async fn ingest(&self, buffer: &mut BatchBuffer, ticker: &mut Interval, line: String) -> bool {
        match decoder::decode(&line) {
            Ok(Some(Decoded { record, warnings })) => {
                for warning in warnings {
                    self.faults.report(Fault::FieldDegraded {
                        hex_ident: record.hex_ident.clone(),
                        warning,
                    });
                }
                self.stats.record_decoded();
                match buffer.add(record) {
                    Some(batch) => {
                        ticker.reset();
                        self.send(batch, FlushTrigger::Size).await
                    }
                    None => true,
                }
            }
            Ok(None) => true,
            Err(e) => {
                self.stats.record_malformed();
                self.faults.report(Fault::MalformedLine(e));
                true
            }
        }
    }

    /// Flush the buffer if non-empty. Returns `false` once the batch queue
    /// is closed.
    async fn flush(
        &self,
        buffer: &mut BatchBuffer,
        ticker: &mut Interval,
        trigger: FlushTrigger,
    ) -> bool {
        match buffer.take() {
            Some(batch) => {
                if trigger != FlushTrigger::Interval {
                    ticker.reset();
                }
                self.send(batch, trigger).await
            }
            None => true,
        }
    }

    async fn send(&self, batch: Batch, trigger: FlushTrigger) -> bool {
        let records = batch.len();
        tracing::debug!("Flushing batch of {} records ({})", records, trigger);
        self.stats.record_flush(trigger);

        if self.batches.send(batch).await.is_err() {
            tracing::error!("Sink writer gone, {} records lost", records);
            return false;
        }
        true
    }
}
