//! Persistence boundary: one record in, one outcome out.

use serde::Serialize;
use tracing::debug;

use eventharvest_shared::{EventRecord, EventRow};
use eventharvest_storage::EventStore;

/// A record the store refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveFailure {
    pub title: String,
    pub reason: String,
}

/// Result of a single save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved,
    Failed(SaveFailure),
}

/// Wraps an [`EventStore`] so that store errors become outcomes instead of
/// aborting the batch.
pub struct Sink<S: EventStore> {
    store: S,
    include_id: bool,
}

impl<S: EventStore> Sink<S> {
    /// `include_id` controls whether the run-local id is sent to the store.
    pub fn new(store: S, include_id: bool) -> Self {
        Self { store, include_id }
    }

    /// Write `record`, converting any store error into [`SaveOutcome::Failed`].
    ///
    /// The store always learns the record id; `include_id` only decides
    /// whether it is also part of the row.
    pub async fn save(&self, record: &EventRecord) -> SaveOutcome {
        let row = EventRow::from_record(record, self.include_id);
        match self.store.insert(&record.id, &row).await {
            Ok(()) => {
                debug!(id = %record.id, title = %record.title, "record saved");
                SaveOutcome::Saved
            }
            Err(e) => {
                debug!(id = %record.id, title = %record.title, error = %e, "store rejected record");
                SaveOutcome::Failed(SaveFailure {
                    title: record.title.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
