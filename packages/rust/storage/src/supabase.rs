//! Remote table store speaking the Supabase/PostgREST insert API.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use eventharvest_shared::{EventHarvestError, EventRow, Result, StoreCredentials};

use crate::EventStore;

/// Timeout for a single insert request.
const INSERT_TIMEOUT_SECS: u64 = 30;

/// Inserts rows into `{url}/rest/v1/{table}`.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    key: String,
}

impl SupabaseStore {
    /// Create a store for `table` using already-resolved credentials.
    pub fn new(credentials: &StoreCredentials, table: &str) -> Result<Self> {
        if table.is_empty() {
            return Err(EventHarvestError::config("store table name is empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(INSERT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                EventHarvestError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{table}", credentials.url.trim_end_matches('/')),
            key: credentials.key.clone(),
        })
    }

    /// Full insert endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EventStore for SupabaseStore {
    async fn insert(&self, record_id: &str, row: &EventRow) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| EventHarvestError::Storage(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EventHarvestError::Storage(format!(
                "insert rejected: HTTP {status}: {}",
                body.trim()
            )));
        }

        debug!(record_id, title = %row.title, "row inserted");
        Ok(())
    }
}
