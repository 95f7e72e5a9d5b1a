// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-series sinks.
//!
//! A sink receives whole batches from the sink writer. Implementations:
//! - [`InfluxSink`]: InfluxDB line protocol over HTTP
//! - [`StdoutSink`]: line protocol printed to stdout (dry run)
//! - [`MemorySink`]: in-memory recorder for tests and embedding

pub mod influx;
pub mod memory;
pub mod point;
pub mod stdout;

pub use influx::InfluxSink;
pub use memory::{MemorySink, MemorySinkView};
pub use point::{encode_batch, record_to_point, EncodedBatch, MEASUREMENT};
pub use stdout::StdoutSink;

use crate::config::{ConfigError, SinkConfig, SinkKind};
use crate::record::Batch;
use sbs_influx::InfluxError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a sink write or close.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Influx(#[from] InfluxError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink is closed")]
    Closed,
}

/// Outcome of one successful batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Points accepted by the sink.
    pub written: usize,
    /// Records left out because they produced no fields.
    pub skipped: usize,
}

/// Destination for completed batches.
///
/// Owned exclusively by the sink writer; calls never overlap.
pub trait TimeSeriesSink: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Write one batch. The batch is consumed whatever the outcome.
    fn write_batch(
        &mut self,
        batch: Batch,
    ) -> impl Future<Output = Result<WriteSummary, SinkError>> + Send;

    /// Release resources. Called once, after the last write.
    fn close(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send {
        async { Ok(()) }
    }
}

/// Sink selected by configuration.
#[derive(Debug)]
pub enum ConfiguredSink {
    Influx(InfluxSink),
    Stdout(StdoutSink),
}

impl ConfiguredSink {
    pub fn from_config(config: &SinkConfig) -> Result<Self, SinkSetupError> {
        match config.kind {
            SinkKind::Influx => {
                let influx = config.influx()?;
                Ok(ConfiguredSink::Influx(InfluxSink::new(&influx)?))
            }
            SinkKind::Stdout => Ok(ConfiguredSink::Stdout(StdoutSink::new())),
        }
    }
}

impl TimeSeriesSink for ConfiguredSink {
    fn name(&self) -> &'static str {
        match self {
            ConfiguredSink::Influx(s) => s.name(),
            ConfiguredSink::Stdout(s) => s.name(),
        }
    }

    async fn write_batch(&mut self, batch: Batch) -> Result<WriteSummary, SinkError> {
        match self {
            ConfiguredSink::Influx(s) => s.write_batch(batch).await,
            ConfiguredSink::Stdout(s) => s.write_batch(batch).await,
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        match self {
            ConfiguredSink::Influx(s) => s.close().await,
            ConfiguredSink::Stdout(s) => s.close().await,
        }
    }
}

/// Failure to build the configured sink.
#[derive(Debug, Error)]
pub enum SinkSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Influx(#[from] InfluxError),
}
