//! Core domain types for the event extraction pipeline.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{EventHarvestError, Result};

/// Category assigned when a detail page carries no tag list.
pub const DEFAULT_CATEGORY: &str = "General";

/// Start date used when the listing's time text cannot be parsed.
pub const PLACEHOLDER_START_DATE: &str = "2025-09-12T00:00:00";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = EventHarvestError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| EventHarvestError::validation(format!("invalid run id '{s}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// CandidateBlock
// ---------------------------------------------------------------------------

/// One listing entry, extracted before the detail page is visited.
///
/// Lives for a single pipeline iteration and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBlock {
    /// Trimmed link text. Never empty.
    pub title: String,
    /// Absolute URL of the event's detail page.
    pub detail_url: Url,
    /// Text of the first descriptive element.
    pub raw_location_text: String,
    /// Text of the second descriptive element, empty when absent.
    pub raw_time_text: String,
}

// ---------------------------------------------------------------------------
// DetailInfo
// ---------------------------------------------------------------------------

/// A latitude/longitude pair recovered from the same script block.
///
/// Kept as one value so a record can never carry half a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Attributes recovered from an event's detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailInfo {
    pub category: String,
    pub coordinates: Option<Coordinates>,
}

impl Default for DetailInfo {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            coordinates: None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventRecord / EventRow
// ---------------------------------------------------------------------------

/// The canonical, normalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Sequence number within the run, as a string.
    pub id: String,
    pub title: String,
    pub description: String,
    /// ISO-8601 local timestamp (`YYYY-MM-DDTHH:MM:SS`).
    pub start_date: String,
    pub location_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// The shape written to a backing store.
///
/// `id` is only sent when the deployment asks for it; otherwise the store
/// assigns its own key. Coordinates are sent as explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub location_name: String,
    pub category: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl EventRow {
    /// Build the wire row for `record`.
    pub fn from_record(record: &EventRecord, include_id: bool) -> Self {
        Self {
            id: include_id.then(|| record.id.clone()),
            title: record.title.clone(),
            description: record.description.clone(),
            start_date: record.start_date.clone(),
            location_name: record.location_name.clone(),
            category: record.category.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }
}
