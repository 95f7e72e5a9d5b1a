// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB connection settings.

use crate::error::InfluxError;

/// InfluxDB connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxConfig {
    /// Base URL (e.g., "http://localhost:8181").
    pub url: String,
    /// Authentication token.
    pub token: String,
    /// Target database (sent as the `bucket` of the v2 write API).
    pub database: String,
}

impl InfluxConfig {
    /// Create a configuration from its three parts.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            database: database.into(),
        }
    }

    /// Check that every setting is present.
    pub fn validate(&self) -> Result<(), InfluxError> {
        if self.url.trim().is_empty() {
            return Err(InfluxError::Config("url cannot be empty".into()));
        }
        if self.token.is_empty() {
            return Err(InfluxError::Config("token cannot be empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(InfluxError::Config("database cannot be empty".into()));
        }
        Ok(())
    }

    /// URL of the line protocol write endpoint.
    pub fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.url.trim_end_matches('/'))
    }
}
