//! Shared types, error model, and configuration for EventHarvest.
//!
//! This crate is the foundation depended on by all other EventHarvest crates.
//! It provides:
//! - [`EventHarvestError`]: the unified error type
//! - Domain types ([`CandidateBlock`], [`DetailInfo`], [`EventRecord`], [`EventRow`], [`RunId`])
//! - Configuration ([`AppConfig`], [`SelectorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, SelectorConfig, SourceConfig, StoreBackendKind, StoreConfig, StoreCredentials,
    config_dir, config_file_path, init_config, load_config, load_config_from, parse_listing_url,
    resolve_store_credentials,
};
pub use error::{EventHarvestError, Result};
pub use types::{
    CandidateBlock, Coordinates, DEFAULT_CATEGORY, DetailInfo, EventRecord, EventRow,
    PLACEHOLDER_START_DATE, RunId,
};
