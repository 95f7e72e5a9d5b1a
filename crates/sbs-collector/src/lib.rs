// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SBS-1 collector
//!
//! Streams aircraft surveillance messages from a dump1090-style
//! BaseStation feed (TCP, port 30003), decodes the `MSG` lines into typed
//! [`Record`]s, groups them into batches and writes each batch to a
//! time-series sink (InfluxDB 3 by default).
//!
//! # Architecture
//!
//! ```text
//! TCP feed -> SourceReader -> Batcher -> SinkWriter -> TimeSeriesSink
//!                  \             |            /
//!                   +------ FaultReporter --+
//! ```
//!
//! Stages are independent tokio tasks joined by bounded queues. A slow
//! sink never blocks the socket reader: lines are dropped at the first
//! queue when it is full, and every drop is counted and reported.
//!
//! # Example
//!
//! ```rust,no_run
//! use sbs_collector::sink::MemorySink;
//! use sbs_collector::{BatchConfig, Pipeline, PipelineConfig, SourceConfig};
//!
//! # async fn demo() {
//! let config = PipelineConfig::new(SourceConfig::new("localhost", 30003), BatchConfig::default());
//! let sink = MemorySink::new();
//! let view = sink.view();
//!
//! let handle = Pipeline::new(config, sink).start();
//! view.wait_for_batches(1).await;
//! let report = handle.shutdown().await;
//! println!("{}", report.stats);
//! # }
//! ```

pub mod batcher;
pub mod config;
pub mod decoder;
pub mod fault;
pub mod pipeline;
pub mod record;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod stats;
pub mod writer;

pub use config::{BatchConfig, Config, ConfigError, SinkConfig, SinkKind, SourceConfig};
pub use decoder::{decode, DecodeError, Decoded, FieldWarning};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineHandle, PipelineReport};
pub use record::{Batch, MessageKind, Record};
pub use sink::{ConfiguredSink, SinkError, TimeSeriesSink, WriteSummary};
pub use source::SourceError;
pub use stats::StatsSnapshot;
