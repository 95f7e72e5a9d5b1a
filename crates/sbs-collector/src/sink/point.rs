// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record to InfluxDB point mapping.
//!
//! Maps each [`Record`] to one point of the `aircraft_sbs1` measurement:
//! - tags: `message_type`, `hex_ident`, and `transmission_type`, `callsign`,
//!   `squawk` when present
//! - fields: identifiers, kinematics, flags, and the logged timestamp as
//!   integer milliseconds since the epoch
//! - timestamp: the generated timestamp in nanoseconds

use crate::record::{Batch, Record};
use sbs_influx::{FieldValue, Point};

/// Measurement every record is written to.
pub const MEASUREMENT: &str = "aircraft_sbs1";

/// Build the point for one record.
pub fn record_to_point(record: &Record) -> Point {
    let mut point = Point::new(MEASUREMENT).tag("message_type", record.message_type.as_str());

    if let Some(v) = &record.transmission_type {
        point = point.tag("transmission_type", v.as_str());
    }
    point = point.tag("hex_ident", record.hex_ident.as_str());
    if let Some(v) = &record.callsign {
        point = point.tag("callsign", v.as_str());
    }
    if let Some(v) = &record.squawk {
        point = point.tag("squawk", v.as_str());
    }

    point = optional(point, "session_id", record.session_id);
    point = optional(point, "aircraft_id", record.aircraft_id);
    point = optional(point, "flight_id", record.flight_id);
    point = point.field("logged_timestamp_unix_ms", record.logged_at.timestamp_millis());
    point = optional(point, "altitude_ft", record.altitude_ft);
    point = optional(point, "ground_speed_kts", record.ground_speed_kts);
    point = optional(point, "track_deg", record.track_deg);
    point = optional(point, "latitude", record.latitude);
    point = optional(point, "longitude", record.longitude);
    point = optional(point, "vertical_rate_fpm", record.vertical_rate_fpm);
    point = optional(point, "alert", record.alert);
    point = optional(point, "emergency", record.emergency);
    point = optional(point, "spi", record.spi);
    point = optional(point, "is_on_ground", record.is_on_ground);

    match record.generated_at.timestamp_nanos_opt() {
        Some(ns) => point.timestamp_ns(ns),
        None => point,
    }
}

fn optional<T: Into<FieldValue>>(point: Point, key: &str, value: Option<T>) -> Point {
    match value {
        Some(v) => point.field(key, v),
        None => point,
    }
}

/// Line protocol for a batch, plus how many records were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBatch {
    pub lines: Vec<String>,
    pub skipped: usize,
}

/// Encode every record of a batch, in order.
pub fn encode_batch(batch: &Batch) -> EncodedBatch {
    encode_points(batch.iter().map(record_to_point))
}

/// Encode points, skipping (with a warning) any that carry no fields.
pub fn encode_points(points: impl IntoIterator<Item = Point>) -> EncodedBatch {
    let mut encoded = EncodedBatch::default();
    for point in points {
        match point.to_line() {
            Ok(line) => encoded.lines.push(line),
            Err(e) => {
                tracing::warn!(
                    "Skipping point for {}: {}",
                    point.tag_value("hex_ident").unwrap_or("?"),
                    e
                );
                encoded.skipped += 1;
            }
        }
    }
    encoded
}
