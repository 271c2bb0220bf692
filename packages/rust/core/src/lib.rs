//! Core pipeline orchestration and domain logic for EventHarvest.
//!
//! This crate ties together the listing walker, detail resolver, normalizer
//! and sink into a single end-to-end run ([`Pipeline::run`]).

pub mod normalize;
pub mod pipeline;
pub mod sink;

pub use normalize::normalize;
pub use pipeline::{Pipeline, ProgressReporter, RunReport, SilentProgress, failed_stats_json};
pub use sink::{SaveFailure, SaveOutcome, Sink};
