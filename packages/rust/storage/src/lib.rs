//! Backing stores for normalized event records.
//!
//! The pipeline only depends on [`EventStore`]. Two implementations ship:
//! - [`Storage`]: a local libSQL database holding runs and events
//! - [`SupabaseStore`]: a remote table behind a Supabase/PostgREST endpoint
//!
//! [`StoreBackend`] picks one at runtime.

mod migrations;
mod supabase;

use std::future::Future;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use eventharvest_shared::{EventHarvestError, EventRow, Result, RunId};
use libsql::{Connection, Database, params};
use serde::Serialize;
use uuid::Uuid;

pub use supabase::SupabaseStore;

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Write side of a backing store.
pub trait EventStore {
    /// Persist one row. Any rejection is returned as an error.
    ///
    /// `record_id` is the run-local id of the record the row was built from.
    /// It is passed whether or not the row itself carries an `id`.
    fn insert(&self, record_id: &str, row: &EventRow) -> impl Future<Output = Result<()>>;
}

impl<S: EventStore> EventStore for &S {
    fn insert(&self, record_id: &str, row: &EventRow) -> impl Future<Output = Result<()>> {
        (**self).insert(record_id, row)
    }
}

/// The store selected for a run.
pub enum StoreBackend<'a> {
    Supabase(SupabaseStore),
    Local(RunWriter<'a>),
    /// Accept every row without writing it (dry runs).
    Discard,
}

impl EventStore for StoreBackend<'_> {
    async fn insert(&self, record_id: &str, row: &EventRow) -> Result<()> {
        match self {
            Self::Supabase(store) => store.insert(record_id, row).await,
            Self::Local(writer) => writer.insert(record_id, row).await,
            Self::Discard => {
                tracing::trace!(record_id, title = %row.title, "discarding row");
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Storage (libSQL)
// ---------------------------------------------------------------------------

/// Local storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// An event row as read back from the local database.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    /// Database key (UUID v7).
    pub id: String,
    /// Run that wrote the row, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Run-local record id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub row: EventRow,
    pub stored_at: DateTime<Utc>,
}

/// A pipeline run as recorded in the `runs` table.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub listing_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EventHarvestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (for listing).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EventHarvestError::Storage(format!(
                "no database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        EventHarvestError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(EventHarvestError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Record the start of a run.
    pub async fn insert_run(&self, run_id: &RunId, listing_url: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO runs (id, listing_url, started_at) VALUES (?1, ?2, ?3)",
                params![run_id.to_string(), listing_url, now.as_str()],
            )
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Mark a run finished and attach its stats.
    pub async fn finish_run(&self, run_id: &RunId, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id.to_string()],
            )
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, listing_url, started_at, finished_at, stats_json
                 FROM runs ORDER BY started_at DESC",
                params![],
            )
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(RunRecord {
                id: row
                    .get::<String>(0)
                    .map_err(|e| EventHarvestError::Storage(e.to_string()))?,
                listing_url: row
                    .get::<String>(1)
                    .map_err(|e| EventHarvestError::Storage(e.to_string()))?,
                started_at: row
                    .get::<String>(2)
                    .map_err(|e| EventHarvestError::Storage(e.to_string()))?,
                finished_at: row.get::<String>(3).ok(),
                stats_json: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }

    /// A writer that files rows under `run_id`.
    pub fn for_run(&self, run_id: &RunId) -> RunWriter<'_> {
        RunWriter {
            storage: self,
            run_id: run_id.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Event operations
    // -----------------------------------------------------------------------

    /// Insert an event row.
    ///
    /// Rows written under a run are upserted on `(run_id, record_id)`, so
    /// saving the same record twice in one run leaves a single row. The
    /// row's own `id` field is not used as the key.
    pub async fn upsert_event(
        &self,
        run_id: Option<&str>,
        record_id: &str,
        row: &EventRow,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO events (id, run_id, record_id, title, description, start_date,
                                     location_name, category, latitude, longitude, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(run_id, record_id) DO UPDATE SET
                   title = excluded.title,
                   description = excluded.description,
                   start_date = excluded.start_date,
                   location_name = excluded.location_name,
                   category = excluded.category,
                   latitude = excluded.latitude,
                   longitude = excluded.longitude,
                   stored_at = excluded.stored_at",
                params![
                    id.as_str(),
                    run_id,
                    record_id,
                    row.title.as_str(),
                    row.description.as_str(),
                    row.start_date.as_str(),
                    row.location_name.as_str(),
                    row.category.as_str(),
                    row.latitude,
                    row.longitude,
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List stored events matching `filter`, ordered by start date.
    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        self.list_events_at(filter, Local::now().naive_local()).await
    }

    /// [`Storage::list_events`] with an explicit "now" for `since` windows.
    async fn list_events_at(
        &self,
        filter: &EventFilter,
        now: NaiveDateTime,
    ) -> Result<Vec<StoredEvent>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(run_id) = &filter.run_id {
            args.push(run_id.to_string());
            clauses.push(format!("run_id = ?{}", args.len()));
        }

        if let Some(category) = filter.category.as_deref().filter(|c| !is_all(c)) {
            args.push(category.to_string());
            clauses.push(format!("category = ?{}", args.len()));
        }

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            args.push(format!("%{}%", escape_like(search)));
            let n = args.len();
            clauses.push(format!(
                "(title LIKE ?{n} ESCAPE '\\' OR description LIKE ?{n} ESCAPE '\\' \
                 OR location_name LIKE ?{n} ESCAPE '\\')"
            ));
        }

        if let Some(since) = filter.since {
            args.push(since.start(now).format(TIMESTAMP_FORMAT).to_string());
            clauses.push(format!("start_date >= ?{}", args.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT id, run_id, record_id, title, description, start_date,
                    location_name, category, latitude, longitude, stored_at
             FROM events {where_sql} ORDER BY start_date, title"
        );

        let rows = self
            .conn
            .query(&sql, libsql::params_from_iter(args))
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;
        collect_events(rows).await
    }

    /// List the events written by one run, in record order.
    pub async fn list_events_by_run(&self, run_id: &RunId) -> Result<Vec<StoredEvent>> {
        let rows = self
            .conn
            .query(
                "SELECT id, run_id, record_id, title, description, start_date,
                        location_name, category, latitude, longitude, stored_at
                 FROM events WHERE run_id = ?1
                 ORDER BY CAST(record_id AS INTEGER), stored_at",
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| EventHarvestError::Storage(e.to_string()))?;
        collect_events(rows).await
    }
}

/// Files rows in the local database under one run.
pub struct RunWriter<'a> {
    storage: &'a Storage,
    run_id: String,
}

impl EventStore for RunWriter<'_> {
    async fn insert(&self, record_id: &str, row: &EventRow) -> Result<()> {
        self.storage
            .upsert_event(Some(&self.run_id), record_id, row)
            .await
    }
}

// ---------------------------------------------------------------------------
// Event filters
// ---------------------------------------------------------------------------

/// Format of `start_date` values in the `events` table.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Read-side filter for [`Storage::list_events`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub run_id: Option<RunId>,
    /// Exact category; `all` matches every category.
    pub category: Option<String>,
    /// Case-insensitive substring of title, description or location.
    pub search: Option<String>,
    pub since: Option<DateRange>,
}

/// Start-date window relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    /// From local midnight today.
    Today,
    /// The last 7 days.
    Week,
    /// The last 30 days.
    Month,
}

impl DateRange {
    /// Earliest start date inside the window.
    pub fn start(self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::Today => now.date().and_time(NaiveTime::MIN),
            Self::Week => now - TimeDelta::days(7),
            Self::Month => now - TimeDelta::days(30),
        }
    }
}

impl FromStr for DateRange {
    type Err = EventHarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(EventHarvestError::validation(format!(
                "unknown date range '{other}' (expected today, week, or month)"
            ))),
        }
    }
}

fn is_all(category: &str) -> bool {
    category.trim().is_empty() || category.eq_ignore_ascii_case("all")
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

async fn collect_events(mut rows: libsql::Rows) -> Result<Vec<StoredEvent>> {
    let mut results = Vec::new();
    while let Ok(Some(row)) = rows.next().await {
        results.push(row_to_stored_event(&row)?);
    }
    Ok(results)
}

/// Convert a database row to a [`StoredEvent`].
fn row_to_stored_event(row: &libsql::Row) -> Result<StoredEvent> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| EventHarvestError::Storage(e.to_string()))
    };

    Ok(StoredEvent {
        id: text(0)?,
        run_id: row.get::<String>(1).ok(),
        record_id: row.get::<String>(2).ok(),
        row: EventRow {
            id: None,
            title: text(3)?,
            description: text(4)?,
            start_date: text(5)?,
            location_name: text(6)?,
            category: text(7)?,
            latitude: row.get::<f64>(8).ok(),
            longitude: row.get::<f64>(9).ok(),
        },
        stored_at: {
            let s = text(10)?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| EventHarvestError::parse(format!("invalid stored_at '{s}': {e}")))?
        },
    })
}
