// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB output errors.

use thiserror::Error;

/// Errors produced while encoding or writing points.
#[derive(Debug, Error)]
pub enum InfluxError {
    /// A point had no fields (InfluxDB requires at least one).
    #[error("point for measurement '{0}' has no fields")]
    NoFields(String),

    /// Connection settings are incomplete.
    #[error("invalid InfluxDB configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request could not be sent or the response could not be read.
    #[error("InfluxDB request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("InfluxDB write rejected with status {status}: {body}")]
    Status { status: u16, body: String },
}
