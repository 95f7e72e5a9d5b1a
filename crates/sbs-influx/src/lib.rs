// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB output for the SBS-1 collector
//!
//! This crate provides:
//! - InfluxDB Line Protocol generation (`Point`, `FieldValue`)
//! - Escaping rules for measurements, tag keys/values and field keys
//! - An async HTTP writer that posts encoded lines to an InfluxDB write endpoint
//!
//! # Overview
//!
//! The crate knows nothing about aircraft. Callers build `Point`s, encode them
//! to lines and hand the lines to an `InfluxClient`.
//!
//! ```text
//! Point --> to_line() --> Vec<String> --> InfluxClient::write_lines --> POST /api/v2/write
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod line_protocol;

pub use client::InfluxClient;
pub use config::InfluxConfig;
pub use error::InfluxError;
pub use line_protocol::{FieldValue, Point};
