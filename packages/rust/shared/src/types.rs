//! Core domain types for AOI Relay records and pipeline events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Board side derived from the program name, selecting which operation
/// identifier applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bottom,
    Top,
}

impl Side {
    /// Derive the side from a program name via case-insensitive substring
    /// match. `BOT` is checked before `TOP`; a name containing neither
    /// yields `None` and the record cannot be routed.
    pub fn from_program(program: &str) -> Option<Self> {
        let upper = program.to_uppercase();
        if upper.contains("BOT") {
            Some(Self::Bottom)
        } else if upper.contains("TOP") {
            Some(Self::Top)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The casing downstream consumers historically received.
        match self {
            Self::Bottom => write!(f, "Bottom"),
            Self::Top => write!(f, "TOP"),
        }
    }
}

// ---------------------------------------------------------------------------
// TestStatus
// ---------------------------------------------------------------------------

/// Test verdict extracted from the `Result` row of an input file.
///
/// Unrecognized raw values pass through verbatim rather than failing
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Pass,
    Fail,
    Other(String),
}

impl TestStatus {
    /// Map a raw `Result` value: `Good` → PASS, `NG` → FAIL (both
    /// case-insensitive), anything else passes through unchanged.
    pub fn from_result_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("Good") {
            Self::Pass
        } else if value.eq_ignore_ascii_case("NG") {
            Self::Fail
        } else {
            Self::Other(value.to_string())
        }
    }

    /// The status code string written into reports.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// InputRecord
// ---------------------------------------------------------------------------

/// The structured fields extracted from one input file.
///
/// Owned exclusively by the processing step that created it; processing is
/// strictly sequential, so the record is never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    /// Serial number from the `Barcode` row.
    pub serial_number: String,
    /// Verdict from the `Result` row.
    pub status: TestStatus,
    /// Program name, also the report's recipe id.
    pub program: String,
    /// Side derived from the program name, if any.
    pub side: Option<Side>,
    /// Block sequence, filled only by enrichment.
    pub sequence: Option<String>,
    /// Work-order detail, filled only by enrichment.
    pub work_order: Option<String>,
}

impl InputRecord {
    /// Fold a store lookup result into the record.
    pub fn apply_enrichment(&mut self, enrichment: Enrichment) {
        self.work_order = enrichment.order_number;
        self.sequence = enrichment.block_number;
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// The order-number/block-number pair resolved from the relational store
/// for a serial. Zero matching rows is an empty enrichment, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub order_number: Option<String>,
    pub block_number: Option<String>,
}

// ---------------------------------------------------------------------------
// RecordEvent
// ---------------------------------------------------------------------------

/// Event published once a record has cleared extraction and enrichment.
///
/// Any display is a subscriber of these events, never a dependency the
/// pipeline blocks on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEvent {
    /// Time-sortable event identifier.
    pub id: Uuid,
    /// Name of the input file the record came from.
    pub file_name: String,
    pub serial_number: String,
    pub status: TestStatus,
    pub program: String,
    pub side: Side,
    pub work_order: Option<String>,
    pub sequence: Option<String>,
    pub processed_at: DateTime<Utc>,
}
