// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Environment configuration for the collector.
//!
//! ## Source
//! - `DUMP1090_HOST`: feed host (default: "localhost")
//! - `DUMP1090_PORT`: feed port (default: 30003)
//! - `CONNECT_RETRY_DELAY`: wait between failed connection attempts (default: "5s")
//! - `CONNECT_MAX_RETRIES`: retries after the first failed attempt, 0 = unlimited (default: 0)
//!
//! ## Batching
//! - `BATCH_SIZE`: records per batch (default: 50)
//! - `BATCH_INTERVAL`: maximum time between flushes (default: "5s")
//!
//! ## Output
//! - `OUTPUT_DB_TYPE`: "influxdb" (default) or "stdout"
//! - `INFLUX_URL`, `INFLUXDB_TOKEN`, `INFLUXDB_DATABASE`: mandatory for "influxdb"
//!
//! ## Logging
//! - `LOG_LEVEL`: tracing filter directive (default: "info")
//!
//! Durations are parsed by `humantime`: `500ms`, `5s`, `1m30s`, `2h 15m`.
//! Invalid numbers and durations fall back to defaults silently; only the
//! output settings can fail.
//!
//! # Example
//!
//! ```bash
//! export DUMP1090_HOST=piaware.local
//! export INFLUX_URL=http://localhost:8181
//! export INFLUXDB_TOKEN=apiv3_xxx
//! export INFLUXDB_DATABASE=adsb
//! export BATCH_INTERVAL=2s
//! ```

use crate::pipeline::PipelineConfig;
use sbs_influx::InfluxConfig;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable names
pub const ENV_DUMP1090_HOST: &str = "DUMP1090_HOST";
pub const ENV_DUMP1090_PORT: &str = "DUMP1090_PORT";
pub const ENV_OUTPUT_DB_TYPE: &str = "OUTPUT_DB_TYPE";
pub const ENV_INFLUX_URL: &str = "INFLUX_URL";
pub const ENV_INFLUXDB_TOKEN: &str = "INFLUXDB_TOKEN";
pub const ENV_INFLUXDB_DATABASE: &str = "INFLUXDB_DATABASE";
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub const ENV_BATCH_INTERVAL: &str = "BATCH_INTERVAL";
pub const ENV_CONNECT_RETRY_DELAY: &str = "CONNECT_RETRY_DELAY";
pub const ENV_CONNECT_MAX_RETRIES: &str = "CONNECT_MAX_RETRIES";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 30003;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Raw-line queue between the source reader and the batcher.
pub const LINE_QUEUE_CAPACITY: usize = 1000;
/// Completed-batch queue between the batcher and the sink writer.
pub const BATCH_QUEUE_CAPACITY: usize = 10;
/// Fault queue feeding the fault reporter.
pub const FAULT_QUEUE_CAPACITY: usize = 100;
/// Initial read buffer for the feed connection.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;
/// Longest accepted feed line.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;
/// Upper bound for a single TCP connect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for a single sink write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Safety margin added to the shutdown drain budget.
pub const DRAIN_MARGIN: Duration = Duration::from_secs(2);
/// Minimum time between two backpressure drop reports.
pub const DROP_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{} must be set for the influxdb output type", .missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("unsupported OUTPUT_DB_TYPE '{0}' (expected 'influxdb' or 'stdout')")]
    UnsupportedSink(String),
}

/// Output selected by `OUTPUT_DB_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    #[default]
    Influx,
    /// Line protocol printed to stdout.
    Stdout,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "influxdb" => Ok(SinkKind::Influx),
            "stdout" => Ok(SinkKind::Stdout),
            _ => Err(ConfigError::UnsupportedSink(s.to_string())),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Influx => write!(f, "influxdb"),
            SinkKind::Stdout => write!(f, "stdout"),
        }
    }
}

/// Feed connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    /// Wait between failed connection attempts.
    pub retry_delay: Duration,
    /// Retries after the first failed attempt (0 = unlimited).
    pub max_retries: u32,
    pub connect_timeout: Duration,
    pub line_queue_capacity: usize,
    pub read_buffer_size: usize,
    pub max_line_length: usize,
}

impl SourceConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: CONNECT_TIMEOUT,
            line_queue_capacity: LINE_QUEUE_CAPACITY,
            read_buffer_size: READ_BUFFER_SIZE,
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    /// `host:port` as used in logs and errors.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

/// Batching settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Records per batch, at least 1.
    pub size: usize,
    /// Maximum time between flushes, non-zero.
    pub interval: Duration,
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_BATCH_INTERVAL,
            queue_capacity: BATCH_QUEUE_CAPACITY,
        }
    }
}

/// Output settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub influx_url: Option<String>,
    pub influx_token: Option<String>,
    pub influx_database: Option<String>,
    pub write_timeout: Duration,
}

impl SinkConfig {
    /// InfluxDB connection settings, or the list of missing variables.
    pub fn influx(&self) -> Result<InfluxConfig, ConfigError> {
        let mut missing = Vec::new();
        if self.influx_url.is_none() {
            missing.push(ENV_INFLUX_URL);
        }
        if self.influx_token.is_none() {
            missing.push(ENV_INFLUXDB_TOKEN);
        }
        if self.influx_database.is_none() {
            missing.push(ENV_INFLUXDB_DATABASE);
        }

        match (&self.influx_url, &self.influx_token, &self.influx_database) {
            (Some(url), Some(token), Some(database)) => {
                Ok(InfluxConfig::new(url.clone(), token.clone(), database.clone()))
            }
            _ => Err(ConfigError::MissingCredentials { missing }),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            influx_url: None,
            influx_token: None,
            influx_database: None,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("kind", &self.kind)
            .field("influx_url", &self.influx_url)
            .field("influx_token", &self.influx_token.as_ref().map(|_| "***"))
            .field("influx_database", &self.influx_database)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

/// Complete collector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: SourceConfig,
    pub batch: BatchConfig,
    pub sink: SinkConfig,
    pub log_level: String,
}

impl Config {
    /// Load and validate from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok())
    }

    /// Load and validate from an arbitrary key lookup.
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read every setting, applying defaults for absent or invalid values.
    ///
    /// Fails only on an unknown output type; credentials are checked by
    /// [`Config::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut source = SourceConfig::new(
            get(ENV_DUMP1090_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            get(ENV_DUMP1090_PORT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        );
        source.retry_delay = get(ENV_CONNECT_RETRY_DELAY)
            .and_then(|v| parse_duration(&v))
            .unwrap_or(DEFAULT_RETRY_DELAY);
        source.max_retries = get(ENV_CONNECT_MAX_RETRIES)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let batch = BatchConfig {
            size: get(ENV_BATCH_SIZE)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            interval: get(ENV_BATCH_INTERVAL)
                .and_then(|v| parse_duration(&v))
                .filter(|d| !d.is_zero())
                .unwrap_or(DEFAULT_BATCH_INTERVAL),
            queue_capacity: BATCH_QUEUE_CAPACITY,
        };

        let kind = match get(ENV_OUTPUT_DB_TYPE) {
            Some(v) => v.parse()?,
            None => SinkKind::default(),
        };
        let sink = SinkConfig {
            kind,
            influx_url: get(ENV_INFLUX_URL),
            influx_token: get(ENV_INFLUXDB_TOKEN),
            influx_database: get(ENV_INFLUXDB_DATABASE),
            write_timeout: WRITE_TIMEOUT,
        };

        Ok(Self {
            source,
            batch,
            sink,
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Check the output settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.sink.kind {
            SinkKind::Influx => self.sink.influx().map(|_| ()),
            SinkKind::Stdout => Ok(()),
        }
    }

    /// Stage settings for [`crate::pipeline::Pipeline`].
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            source: self.source.clone(),
            batch: self.batch,
            write_timeout: self.sink.write_timeout,
            fault_queue_capacity: FAULT_QUEUE_CAPACITY,
            drain_margin: DRAIN_MARGIN,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source:         {}", self.source.address())?;
        writeln!(
            f,
            "reconnect:      every {:?}, {}",
            self.source.retry_delay,
            match self.source.max_retries {
                0 => "unlimited retries".to_string(),
                n => format!("at most {} retries", n),
            }
        )?;
        writeln!(
            f,
            "batching:       {} records or {:?}",
            self.batch.size, self.batch.interval
        )?;
        write!(f, "output:         {}", self.sink.kind)?;
        if self.sink.kind == SinkKind::Influx {
            write!(
                f,
                " ({} / {})",
                self.sink.influx_url.as_deref().unwrap_or("-"),
                self.sink.influx_database.as_deref().unwrap_or("-")
            )?;
        }
        writeln!(f)?;
        write!(f, "log level:      {}", self.log_level)
    }
}

/// Parse a human-readable duration (`500ms`, `5s`, `1m30s`, `2h 15m`).
/// `None` when the value does not parse.
pub fn parse_duration(s: &str) -> Option<Duration> {
    humantime::parse_duration(s.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        (ENV_INFLUX_URL, "http://influx:8181"),
        (ENV_INFLUXDB_TOKEN, "secret"),
        (ENV_INFLUXDB_DATABASE, "adsb"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::load(lookup(&CREDENTIALS)).unwrap();

        assert_eq!(config.source.host, "localhost");
        assert_eq!(config.source.port, 30003);
        assert_eq!(config.source.retry_delay, Duration::from_secs(5));
        assert_eq!(config.source.max_retries, 0);
        assert_eq!(config.batch.size, 50);
        assert_eq!(config.batch.interval, Duration::from_secs(5));
        assert_eq!(config.sink.kind, SinkKind::Influx);
        assert_eq!(config.log_level, "info");

        let influx = config.sink.influx().unwrap();
        assert_eq!(influx.url, "http://influx:8181");
        assert_eq!(influx.token, "secret");
        assert_eq!(influx.database, "adsb");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            (ENV_DUMP1090_HOST, "piaware.local"),
            (ENV_DUMP1090_PORT, "30103"),
            (ENV_BATCH_SIZE, "200"),
            (ENV_BATCH_INTERVAL, "1m30s"),
            (ENV_CONNECT_RETRY_DELAY, "250ms"),
            (ENV_CONNECT_MAX_RETRIES, "3"),
            (ENV_LOG_LEVEL, "debug"),
        ]);
        let config = Config::load(lookup(&pairs)).unwrap();

        assert_eq!(config.source.address(), "piaware.local:30103");
        assert_eq!(config.batch.size, 200);
        assert_eq!(config.batch.interval, Duration::from_secs(90));
        assert_eq!(config.source.retry_delay, Duration::from_millis(250));
        assert_eq!(config.source.max_retries, 3);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            (ENV_DUMP1090_PORT, "port"),
            (ENV_BATCH_SIZE, "-5"),
            (ENV_BATCH_INTERVAL, "0s"),
            (ENV_CONNECT_RETRY_DELAY, "soon"),
            (ENV_CONNECT_MAX_RETRIES, "many"),
        ]);
        let config = Config::load(lookup(&pairs)).unwrap();

        assert_eq!(config.source.port, DEFAULT_PORT);
        assert_eq!(config.batch.size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.batch.interval, DEFAULT_BATCH_INTERVAL);
        assert_eq!(config.source.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(config.source.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_zero_batch_size_falls_back() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push((ENV_BATCH_SIZE, "0"));
        let config = Config::load(lookup(&pairs)).unwrap();
        assert_eq!(config.batch.size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_missing_credentials() {
        let err = Config::load(lookup(&[(ENV_INFLUX_URL, "http://influx:8181")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredentials {
                missing: vec![ENV_INFLUXDB_TOKEN, ENV_INFLUXDB_DATABASE]
            }
        );
        assert!(err.to_string().contains("INFLUXDB_TOKEN, INFLUXDB_DATABASE"));
    }

    #[test]
    fn test_empty_credentials_count_as_missing() {
        let err = Config::load(lookup(&[
            (ENV_INFLUX_URL, "http://influx:8181"),
            (ENV_INFLUXDB_TOKEN, "  "),
            (ENV_INFLUXDB_DATABASE, "adsb"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials { .. }));
    }

    #[test]
    fn test_stdout_needs_no_credentials() {
        let config = Config::load(lookup(&[(ENV_OUTPUT_DB_TYPE, "STDOUT")])).unwrap();
        assert_eq!(config.sink.kind, SinkKind::Stdout);
    }

    #[test]
    fn test_unsupported_sink() {
        let err = Config::load(lookup(&[(ENV_OUTPUT_DB_TYPE, "prometheus")])).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedSink("prometheus".into()));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = Config::load(lookup(&CREDENTIALS)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_pipeline_config() {
        let config = Config::load(lookup(&CREDENTIALS)).unwrap();
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.source.line_queue_capacity, 1000);
        assert_eq!(pipeline.batch.queue_capacity, 10);
        assert_eq!(pipeline.fault_queue_capacity, 100);
        assert_eq!(pipeline.write_timeout, Duration::from_secs(10));
        assert_eq!(pipeline.drain_budget(), Duration::from_secs(22));
    }

    #[test]
    fn test_ipv6_address() {
        assert_eq!(SourceConfig::new("::1", 30003).address(), "[::1]:30003");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0s"), Some(Duration::ZERO));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration(" 300ms "), Some(Duration::from_millis(300)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h 15m"), Some(Duration::from_secs(8100)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("42ns"), Some(Duration::from_nanos(42)));

        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("1.5h"), None);
        assert_eq!(parse_duration("soon"), None);
    }
}
