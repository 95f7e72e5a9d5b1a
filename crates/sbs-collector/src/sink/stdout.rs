// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Line protocol printed to stdout, for dry runs and piping.

use super::point::encode_batch;
use super::{SinkError, TimeSeriesSink, WriteSummary};
use crate::record::Batch;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};

/// Writes each batch as newline-terminated line protocol.
#[derive(Debug)]
pub struct StdoutSink<W = Stdout> {
    out: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Print to an arbitrary writer instead of stdout.
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W> TimeSeriesSink for StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn write_batch(&mut self, batch: Batch) -> Result<WriteSummary, SinkError> {
        let encoded = encode_batch(&batch);

        let mut text = String::new();
        for line in &encoded.lines {
            text.push_str(line);
            text.push('\n');
        }
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;

        Ok(WriteSummary {
            written: encoded.lines.len(),
            skipped: encoded.skipped,
        })
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_prints_one_line_per_record() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let batch = Batch::new(vec![Record::new("AAAAAA", t, t), Record::new("BBBBBB", t, t)])
            .unwrap();

        let mut sink = StdoutSink::with_writer(Vec::new());
        let summary = sink.write_batch(batch).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(summary.written, 2);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "aircraft_sbs1,hex_ident=AAAAAA,message_type=MSG logged_timestamp_unix_ms=1704067200000i 1704067200000000000"
        );
        assert!(out.ends_with('\n'));
    }
}
