//! End-to-end run: listing → detail → normalize → sink, one item at a time.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use eventharvest_crawler::{DetailResolver, ListingWalker, PageRenderer, RenderSession, Selectors};
use eventharvest_shared::{EventHarvestError, EventRecord, Result, RunId};
use eventharvest_storage::EventStore;

use crate::normalize::normalize;
use crate::sink::{SaveFailure, SaveOutcome, Sink};

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Candidates processed, including those the store rejected.
    pub attempted: usize,
    /// Records the store accepted.
    pub persisted: usize,
    pub failures: Vec<SaveFailure>,
    /// Every normalized record, in listing order.
    #[serde(skip)]
    pub records: Vec<EventRecord>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    /// Stats blob stored alongside a finished run.
    pub fn stats_json(&self) -> String {
        serde_json::json!({
            "status": if self.failures.is_empty() { "completed" } else { "completed_with_errors" },
            "attempted": self.attempted,
            "persisted": self.persisted,
            "failures": self.failures,
            "duration_ms": self.elapsed.as_millis() as u64,
        })
        .to_string()
    }
}

/// Stats blob for a run that ended with `error` before producing a report.
pub fn failed_stats_json(error: &EventHarvestError) -> String {
    serde_json::json!({
        "status": "failed",
        "error": error.to_string(),
    })
    .to_string()
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a candidate is resolved.
    fn item_started(&self, title: &str, current: usize, total: usize);
    /// Called after a candidate's save outcome is known.
    fn item_finished(&self, title: &str, saved: bool);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_started(&self, _title: &str, _current: usize, _total: usize) {}
    fn item_finished(&self, _title: &str, _saved: bool) {}
    fn done(&self, _report: &RunReport) {}
}

/// Listing walker, detail resolver and sink wired together.
pub struct Pipeline<S: EventStore> {
    walker: ListingWalker,
    resolver: DetailResolver,
    sink: Sink<S>,
}

impl<S: EventStore> Pipeline<S> {
    pub fn new(selectors: Selectors, sink: Sink<S>) -> Self {
        Self {
            walker: ListingWalker::new(selectors.clone()),
            resolver: DetailResolver::new(selectors),
            sink,
        }
    }

    /// Run the pipeline against `listing_url`.
    ///
    /// Only a failed listing load ends the run with an error. Detail pages
    /// that cannot be loaded fall back to defaults, and rejected saves are
    /// reported in [`RunReport::failures`] while the batch continues.
    #[instrument(skip_all, fields(listing_url = %listing_url, run_id = %run_id))]
    pub async fn run<R: PageRenderer>(
        &self,
        session: &mut RenderSession<R>,
        listing_url: &Url,
        run_id: RunId,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let start = Instant::now();

        progress.phase("Walking listing");
        let candidates = self.walker.walk(session, listing_url).await?;
        let total = candidates.len();
        info!(candidates = total, "starting extraction");

        let mut sequence: u64 = 0;
        let mut records = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut persisted = 0usize;

        progress.phase("Extracting events");
        for candidate in candidates {
            sequence += 1;
            progress.item_started(&candidate.title, sequence as usize, total);

            let detail = self.resolver.resolve(session, &candidate.detail_url).await;
            let record = normalize(&candidate, &detail, sequence);

            match self.sink.save(&record).await {
                SaveOutcome::Saved => {
                    persisted += 1;
                    progress.item_finished(&record.title, true);
                }
                SaveOutcome::Failed(failure) => {
                    warn!(
                        title = %failure.title,
                        reason = %failure.reason,
                        "event not persisted, continuing"
                    );
                    progress.item_finished(&record.title, false);
                    failures.push(failure);
                }
            }

            records.push(record);
        }

        let report = RunReport {
            run_id,
            attempted: records.len(),
            persisted,
            failures,
            records,
            elapsed: start.elapsed(),
        };

        info!(
            attempted = report.attempted,
            persisted = report.persisted,
            failed = report.failures.len(),
            duration_ms = report.elapsed.as_millis() as u64,
            "run completed"
        );
        progress.done(&report);

        Ok(report)
    }

    pub fn sink(&self) -> &Sink<S> {
        &self.sink
    }
}
