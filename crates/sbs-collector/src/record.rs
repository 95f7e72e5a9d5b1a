// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded SBS-1 records and the batches that carry them to a sink.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// First field of an SBS-1 transmission message.
pub const DATA_MESSAGE_TAG: &str = "MSG";

/// Kind of message a [`Record`] was decoded from.
///
/// Only transmission messages become records; every other SBS-1 kind
/// (`SEL`, `ID`, `AIR`, `STA`, `CLK`) is filtered by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    /// `MSG` transmission message.
    #[serde(rename = "MSG")]
    Transmission,
}

impl MessageKind {
    /// Match the first field of a line against known record kinds.
    pub fn from_tag(tag: &str) -> Option<Self> {
        (tag == DATA_MESSAGE_TAG).then_some(MessageKind::Transmission)
    }

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Transmission => DATA_MESSAGE_TAG,
        }
    }
}

/// One decoded SBS-1 transmission message.
///
/// Optional fields are `None` when the input column was empty or could not
/// be parsed. Zero and empty are legitimate values and never mean "absent".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub message_type: MessageKind,
    /// Transmission subtype (`1`..`8`).
    pub transmission_type: Option<String>,
    pub session_id: Option<i64>,
    pub aircraft_id: Option<i64>,
    /// ICAO 24-bit address in hex, the aircraft's key.
    pub hex_ident: String,
    pub flight_id: Option<i64>,
    /// When the receiver generated the message.
    pub generated_at: DateTime<Utc>,
    /// When the receiver logged the message.
    pub logged_at: DateTime<Utc>,
    pub callsign: Option<String>,
    pub altitude_ft: Option<i64>,
    pub ground_speed_kts: Option<f64>,
    pub track_deg: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub vertical_rate_fpm: Option<i64>,
    pub squawk: Option<String>,
    pub alert: Option<bool>,
    pub emergency: Option<bool>,
    pub spi: Option<bool>,
    pub is_on_ground: Option<bool>,
}

impl Record {
    /// Create a transmission record with only the mandatory attributes set.
    pub fn new(
        hex_ident: impl Into<String>,
        generated_at: DateTime<Utc>,
        logged_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: MessageKind::Transmission,
            transmission_type: None,
            session_id: None,
            aircraft_id: None,
            hex_ident: hex_ident.into(),
            flight_id: None,
            generated_at,
            logged_at,
            callsign: None,
            altitude_ft: None,
            ground_speed_kts: None,
            track_deg: None,
            latitude: None,
            longitude: None,
            vertical_rate_fpm: None,
            squawk: None,
            alert: None,
            emergency: None,
            spi: None,
            is_on_ground: None,
        }
    }
}

/// Ordered, non-empty group of records handed to a sink in one write.
///
/// A batch is moved, never cloned, from the batcher to the sink writer.
#[derive(Debug, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Wrap records into a batch. Returns `None` for an empty vector.
    pub fn new(records: Vec<Record>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `false`: a batch holds at least one record.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
