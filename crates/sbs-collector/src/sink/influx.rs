// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB sink.

use super::point::encode_batch;
use super::{SinkError, TimeSeriesSink, WriteSummary};
use crate::record::Batch;
use sbs_influx::{InfluxClient, InfluxConfig, InfluxError};

/// Writes each batch as one line protocol request.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: InfluxClient,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, InfluxError> {
        Ok(Self {
            client: InfluxClient::new(config)?,
        })
    }

    pub fn from_client(client: InfluxClient) -> Self {
        Self { client }
    }
}

impl TimeSeriesSink for InfluxSink {
    fn name(&self) -> &'static str {
        "influxdb"
    }

    async fn write_batch(&mut self, batch: Batch) -> Result<WriteSummary, SinkError> {
        let encoded = encode_batch(&batch);
        drop(batch);

        if encoded.lines.is_empty() {
            return Ok(WriteSummary {
                written: 0,
                skipped: encoded.skipped,
            });
        }

        tracing::debug!(
            "Writing batch of {} points to InfluxDB (database: {})",
            encoded.lines.len(),
            self.client.database()
        );
        self.client.write_lines(&encoded.lines).await?;

        Ok(WriteSummary {
            written: encoded.lines.len(),
            skipped: encoded.skipped,
        })
    }
}
