//! SQL migration definitions for the local event database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: runs, events",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per pipeline run
CREATE TABLE IF NOT EXISTS runs (
    id          TEXT PRIMARY KEY,
    listing_url TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

-- Persisted event records
CREATE TABLE IF NOT EXISTS events (
    id            TEXT PRIMARY KEY,
    run_id        TEXT REFERENCES runs(id) ON DELETE SET NULL,
    record_id     TEXT,
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    start_date    TEXT NOT NULL,
    location_name TEXT NOT NULL,
    category      TEXT NOT NULL,
    latitude      REAL,
    longitude     REAL,
    stored_at     TEXT NOT NULL,
    UNIQUE(run_id, record_id)
);

CREATE INDEX IF NOT EXISTS idx_events_run_id ON events(run_id);
CREATE INDEX IF NOT EXISTS idx_events_start_date ON events(start_date);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
