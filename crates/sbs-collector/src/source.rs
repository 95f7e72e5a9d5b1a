// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Feed connection and line reader.
//!
//! ```text
//! Disconnected --> Connecting --> Connected --(EOF / error)--> Disconnected
//!                      |
//!                      +--(retries exhausted)--> stopped, RetriesExhausted
//! ```
//!
//! Every reconnect, after a failed attempt or a lost session, waits
//! `retry_delay` and aborts on shutdown. Lines go to a bounded queue with
//! `try_send`: when it is full the newest line is dropped. Drops are
//! reported as one fault per `DROP_REPORT_INTERVAL` with the running count.

use crate::config::{SourceConfig, DROP_REPORT_INTERVAL};
use crate::fault::{Fault, FaultSender};
use crate::shutdown::ShutdownContext;
use crate::stats::PipelineStats;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

/// Source reader errors. Only `RetriesExhausted` stops the reader.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("gave up connecting to {address} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        address: String,
        attempts: u32,
        last_error: String,
    },

    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// Why a connected session ended.
enum SessionEnd {
    Cancelled,
    DownstreamClosed,
    Eof,
    Failed(SourceError),
}

/// Reads raw lines from the feed and pushes them to the line queue.
pub struct SourceReader {
    config: SourceConfig,
    lines: mpsc::Sender<String>,
    faults: FaultSender,
    stats: Arc<PipelineStats>,
    shutdown: ShutdownContext,
}

impl SourceReader {
    pub fn new(
        config: SourceConfig,
        lines: mpsc::Sender<String>,
        faults: FaultSender,
        stats: Arc<PipelineStats>,
        shutdown: ShutdownContext,
    ) -> Self {
        Self {
            config,
            lines,
            faults,
            stats,
            shutdown,
        }
    }

    /// Run until shutdown, until the line queue closes, or until the retry
    /// budget is exhausted. The line sender is dropped on return.
    pub async fn run(self) -> Result<(), SourceError> {
        let address = self.config.address();
        let mut failures: u32 = 0;
        let mut drops = DropTally::new(DROP_REPORT_INTERVAL);

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.stats.record_connect_attempt();
            tracing::info!("Connecting to {}", address);

            let connected = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(stream) => {
                    failures = 0;
                    tracing::info!("Connected to {}", address);

                    let end = self.read_session(stream, &mut drops).await;
                    self.report_drops(&mut drops);

                    let reason = match end {
                        SessionEnd::Cancelled | SessionEnd::DownstreamClosed => break,
                        SessionEnd::Eof => "closed by remote".to_string(),
                        SessionEnd::Failed(e) => e.to_string(),
                    };
                    self.faults.report(Fault::ConnectionLost {
                        address: address.clone(),
                        reason,
                        retry_in: self.config.retry_delay,
                    });
                }
                Err(reason) => {
                    failures += 1;

                    if self.config.max_retries > 0 && failures > self.config.max_retries {
                        let err = SourceError::RetriesExhausted {
                            address,
                            attempts: failures,
                            last_error: reason,
                        };
                        self.faults.report(Fault::SourceFatal {
                            reason: err.to_string(),
                        });
                        return Err(err);
                    }

                    self.faults.report(Fault::ConnectFailed {
                        address: address.clone(),
                        attempt: failures,
                        reason,
                        retry_in: self.config.retry_delay,
                    });
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }

        self.report_drops(&mut drops);
        tracing::info!("Source reader stopped");
        Ok(())
    }

    fn report_drops(&self, drops: &mut DropTally) {
        if let Some(fault) = drops.take() {
            self.faults.report(fault);
        }
    }

    async fn connect(&self) -> Result<TcpStream, String> {
        let target = (self.config.host.as_str(), self.config.port);
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(target)).await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {:?}",
                self.config.connect_timeout
            )),
        }
    }

    async fn read_session(&self, stream: TcpStream, drops: &mut DropTally) -> SessionEnd {
        let mut reader = BufReader::with_capacity(self.config.read_buffer_size, stream);
        let mut buf = Vec::with_capacity(256);

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return SessionEnd::Cancelled,
                read = read_bounded_line(&mut reader, &mut buf, self.config.max_line_length) => read,
            };

            match read {
                Ok(ReadLine::Line) => {
                    if !self.forward(&buf, drops) {
                        return SessionEnd::DownstreamClosed;
                    }
                }
                Ok(ReadLine::Eof) => return SessionEnd::Eof,
                Ok(ReadLine::TooLong) => {
                    return SessionEnd::Failed(SourceError::LineTooLong {
                        limit: self.config.max_line_length,
                    })
                }
                Err(e) => return SessionEnd::Failed(SourceError::Io(e)),
            }
        }
    }

    /// Queue one line. Returns `false` once the queue is closed.
    fn forward(&self, raw: &[u8], drops: &mut DropTally) -> bool {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return true;
        }

        self.stats.record_line();
        match self.lines.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.stats.record_drop();
                if let Some(fault) = drops.record(total) {
                    self.faults.report(fault);
                }
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Coalesces backpressure drops into at most one fault per interval.
#[derive(Debug)]
struct DropTally {
    every: Duration,
    pending: u64,
    total: u64,
    last_report: Option<Instant>,
}

impl DropTally {
    fn new(every: Duration) -> Self {
        Self {
            every,
            pending: 0,
            total: 0,
            last_report: None,
        }
    }

    /// Count one drop. Returns a fault when a report is due.
    fn record(&mut self, total: u64) -> Option<Fault> {
        self.pending += 1;
        self.total = total;
        let due = self
            .last_report
            .map_or(true, |at| at.elapsed() >= self.every);
        if due {
            self.take()
        } else {
            None
        }
    }

    /// Report drops not yet reported, if any.
    fn take(&mut self) -> Option<Fault> {
        if self.pending == 0 {
            return None;
        }
        self.last_report = Some(Instant::now());
        Some(Fault::LineDropped {
            dropped: std::mem::take(&mut self.pending),
            total: self.total,
        })
    }
}

/// Result of reading one line.
#[derive(Debug, PartialEq, Eq)]
enum ReadLine {
    /// `buf` holds a line, newline included when present.
    Line,
    /// The line exceeded the limit; the connection must be dropped.
    TooLong,
    Eof,
}

/// Read one newline-terminated line without buffering more than
/// `max_len` bytes of content.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> io::Result<ReadLine> {
    buf.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() {
                ReadLine::Eof
            } else {
                ReadLine::Line
            });
        }

        let (take, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        let content = take - usize::from(done);

        if buf.len() + content > max_len {
            reader.consume(take);
            return Ok(ReadLine::TooLong);
        }

        buf.extend_from_slice(&available[..take]);
        reader.consume(take);

        if done {
            return Ok(ReadLine::Line);
        }
    }
}
