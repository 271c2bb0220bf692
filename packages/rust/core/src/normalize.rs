//! Candidate block + detail info → canonical event record.

use eventharvest_crawler::parse_start_date;
use eventharvest_shared::{
    CandidateBlock, DEFAULT_CATEGORY, DetailInfo, EventRecord, PLACEHOLDER_START_DATE,
};

/// Merge a listing candidate with its detail info into an [`EventRecord`].
///
/// Pure and total: the same inputs always give the same record.
pub fn normalize(candidate: &CandidateBlock, detail: &DetailInfo, sequence_id: u64) -> EventRecord {
    let category = match detail.category.trim() {
        "" => DEFAULT_CATEGORY.to_string(),
        category => category.to_string(),
    };

    let start_date = parse_start_date(&candidate.raw_time_text)
        .unwrap_or_else(|| PLACEHOLDER_START_DATE.to_string());

    let (latitude, longitude) = match detail.coordinates {
        Some(c) => (Some(c.latitude), Some(c.longitude)),
        None => (None, None),
    };

    EventRecord {
        id: sequence_id.to_string(),
        title: candidate.title.clone(),
        description: format!("Event: {}", candidate.title),
        start_date,
        location_name: candidate.raw_location_text.clone(),
        category,
        latitude,
        longitude,
    }
}
