// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pipeline counters.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// What closed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Batch reached the configured size.
    Size,
    /// Batch interval elapsed.
    Interval,
    /// Flush requested through the pipeline handle.
    Request,
    /// Shutdown signal or end of input.
    Drain,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Interval => "interval",
            FlushTrigger::Request => "request",
            FlushTrigger::Drain => "drain",
        };
        f.write_str(name)
    }
}

/// Counters shared by every stage through an `Arc`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    connect_attempts: AtomicU64,
    lines_read: AtomicU64,
    lines_dropped: AtomicU64,
    lines_malformed: AtomicU64,
    records_decoded: AtomicU64,
    flushed_by_size: AtomicU64,
    flushed_by_interval: AtomicU64,
    flushed_by_request: AtomicU64,
    flushed_on_drain: AtomicU64,
    batches_written: AtomicU64,
    batches_failed: AtomicU64,
    points_written: AtomicU64,
    points_skipped: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a backpressure drop and return the running total.
    pub fn record_drop(&self) -> u64 {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_malformed(&self) {
        self.lines_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, trigger: FlushTrigger) {
        let counter = match trigger {
            FlushTrigger::Size => &self.flushed_by_size,
            FlushTrigger::Interval => &self.flushed_by_interval,
            FlushTrigger::Request => &self.flushed_by_request,
            FlushTrigger::Drain => &self.flushed_on_drain,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, written: usize, skipped: usize) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.points_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.points_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            lines_malformed: self.lines_malformed.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            flushed_by_size: self.flushed_by_size.load(Ordering::Relaxed),
            flushed_by_interval: self.flushed_by_interval.load(Ordering::Relaxed),
            flushed_by_request: self.flushed_by_request.load(Ordering::Relaxed),
            flushed_on_drain: self.flushed_on_drain.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            points_written: self.points_written.load(Ordering::Relaxed),
            points_skipped: self.points_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connect_attempts: u64,
    pub lines_read: u64,
    pub lines_dropped: u64,
    pub lines_malformed: u64,
    pub records_decoded: u64,
    pub flushed_by_size: u64,
    pub flushed_by_interval: u64,
    pub flushed_by_request: u64,
    pub flushed_on_drain: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub points_written: u64,
    pub points_skipped: u64,
}

impl StatsSnapshot {
    /// Batches handed to the sink writer, whatever the trigger.
    pub fn batches_flushed(&self) -> u64 {
        self.flushed_by_size
            + self.flushed_by_interval
            + self.flushed_by_request
            + self.flushed_on_drain
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} dropped={} malformed={} records={} batches={} (size={} interval={} request={} drain={}) written={} failed={} points={} skipped={} connects={}",
            self.lines_read,
            self.lines_dropped,
            self.lines_malformed,
            self.records_decoded,
            self.batches_flushed(),
            self.flushed_by_size,
            self.flushed_by_interval,
            self.flushed_by_request,
            self.flushed_on_drain,
            self.batches_written,
            self.batches_failed,
            self.points_written,
            self.points_skipped,
            self.connect_attempts,
        )
    }
}
