// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SBS-1 (BaseStation) line decoder.
//!
//! The feed is comma-separated text with a fixed positional schema:
//!
//! ```text
//! 0   1  2  3  4      5  6          7        8          9        10  11    12    13    14   15   16 17 18 19 20 21
//! MSG,3,1,1,ABCDEF,1,2024/01/01,00:00:00,2024/01/01,00:00:01,,35000,250.5,180.0,51.5,-0.1,0,,0,0,0,0
//! ```
//!
//! Decoding is pure: the fallback clock is an argument, and per-field
//! problems come back as [`FieldWarning`]s for the caller to log.

use crate::record::{MessageKind, Record};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Minimum number of comma-separated fields for a decodable line.
pub const MIN_FIELDS: usize = 10;

/// Date and time columns joined with a space, interpreted as UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

const TRANSMISSION_TYPE: usize = 1;
const SESSION_ID: usize = 2;
const AIRCRAFT_ID: usize = 3;
const HEX_IDENT: usize = 4;
const FLIGHT_ID: usize = 5;
const GENERATED_DATE: usize = 6;
const GENERATED_TIME: usize = 7;
const LOGGED_DATE: usize = 8;
const LOGGED_TIME: usize = 9;
const CALLSIGN: usize = 10;
const ALTITUDE: usize = 11;
const GROUND_SPEED: usize = 12;
const TRACK: usize = 13;
const LATITUDE: usize = 14;
const LONGITUDE: usize = 15;
const VERTICAL_RATE: usize = 16;
const SQUAWK: usize = 17;
const ALERT: usize = 18;
const EMERGENCY: usize = 19;
const SPI: usize = 20;
const IS_ON_GROUND: usize = 21;

/// Structural decode failure. The line is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed line: {fields} fields, expected at least 10: '{line}'")]
    MalformedInput { fields: usize, line: String },
}

/// A degraded field: the record is still produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWarning {
    /// A numeric column did not parse and was left absent.
    InvalidNumber { field: &'static str, value: String },
    /// A timestamp was absent or unparseable and the current time was used.
    TimestampFallback {
        field: &'static str,
        value: Option<String>,
    },
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldWarning::InvalidNumber { field, value } => {
                write!(f, "could not parse {} '{}', field omitted", field, value)
            }
            FieldWarning::TimestampFallback {
                field,
                value: Some(value),
            } => write!(
                f,
                "could not parse {} '{}', using current time",
                field, value
            ),
            FieldWarning::TimestampFallback { field, value: None } => {
                write!(f, "{} missing, using current time", field)
            }
        }
    }
}

/// A decoded record plus the warnings raised while decoding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub record: Record,
    pub warnings: Vec<FieldWarning>,
}

/// Decode one line using the wall clock for timestamp fallback.
pub fn decode(line: &str) -> Result<Option<Decoded>, DecodeError> {
    decode_at(line, Utc::now())
}

/// Decode one line.
///
/// Returns `Ok(None)` for any message kind other than `MSG`, and
/// [`DecodeError::MalformedInput`] when the line has fewer than
/// [`MIN_FIELDS`] fields. The field count is checked first.
pub fn decode_at(line: &str, now: DateTime<Utc>) -> Result<Option<Decoded>, DecodeError> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();

    if fields.len() < MIN_FIELDS {
        return Err(DecodeError::MalformedInput {
            fields: fields.len(),
            line: line.to_string(),
        });
    }

    let Some(kind) = MessageKind::from_tag(fields[0]) else {
        return Ok(None);
    };

    let mut columns = Columns {
        fields: &fields,
        warnings: Vec::new(),
    };

    let generated_at = columns.timestamp(GENERATED_DATE, GENERATED_TIME, "generated timestamp", now);
    let logged_at = columns.timestamp(LOGGED_DATE, LOGGED_TIME, "logged timestamp", now);

    let record = Record {
        message_type: kind,
        transmission_type: columns.text(TRANSMISSION_TYPE),
        session_id: columns.number(SESSION_ID, "session id"),
        aircraft_id: columns.number(AIRCRAFT_ID, "aircraft id"),
        hex_ident: columns.get(HEX_IDENT).unwrap_or_default().to_string(),
        flight_id: columns.number(FLIGHT_ID, "flight id"),
        generated_at,
        logged_at,
        callsign: columns.text(CALLSIGN),
        altitude_ft: columns.number(ALTITUDE, "altitude"),
        ground_speed_kts: columns.float(GROUND_SPEED, "ground speed"),
        track_deg: columns.float(TRACK, "track"),
        latitude: columns.float(LATITUDE, "latitude"),
        longitude: columns.float(LONGITUDE, "longitude"),
        vertical_rate_fpm: columns.number(VERTICAL_RATE, "vertical rate"),
        squawk: columns.text(SQUAWK),
        alert: columns.flag(ALERT),
        emergency: columns.flag(EMERGENCY),
        spi: columns.flag(SPI),
        is_on_ground: columns.flag(IS_ON_GROUND),
    };

    Ok(Some(Decoded {
        record,
        warnings: columns.warnings,
    }))
}

/// Trimmed fields of one line with positional accessors.
struct Columns<'a> {
    fields: &'a [&'a str],
    warnings: Vec<FieldWarning>,
}

impl<'a> Columns<'a> {
    /// Non-empty column at `index`; trailing columns may be missing.
    fn get(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied().filter(|s| !s.is_empty())
    }

    fn text(&self, index: usize) -> Option<String> {
        self.get(index).map(str::to_string)
    }

    fn number(&mut self, index: usize, name: &'static str) -> Option<i64> {
        let raw = self.get(index)?;
        match raw.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.invalid(name, raw);
                None
            }
        }
    }

    fn float(&mut self, index: usize, name: &'static str) -> Option<f64> {
        let raw = self.get(index)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.invalid(name, raw);
                None
            }
        }
    }

    fn flag(&self, index: usize) -> Option<bool> {
        self.get(index).map(|v| v == "1")
    }

    fn timestamp(
        &mut self,
        date: usize,
        time: usize,
        name: &'static str,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let (Some(date), Some(time)) = (self.get(date), self.get(time)) else {
            self.warnings.push(FieldWarning::TimestampFallback {
                field: name,
                value: None,
            });
            return now;
        };

        let joined = format!("{} {}", date, time);
        match NaiveDateTime::parse_from_str(&joined, TIMESTAMP_FORMAT) {
            Ok(naive) => naive.and_utc(),
            Err(_) => {
                self.warnings.push(FieldWarning::TimestampFallback {
                    field: name,
                    value: Some(joined),
                });
                now
            }
        }
    }

    fn invalid(&mut self, field: &'static str, value: &str) {
        self.warnings.push(FieldWarning::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
}
