//! Source Adapter: fetch, normalize, and keyword-filter candidate
//! `ContentRecord`s from one class of upstream feed (spec.md §4.4).

mod feed;
mod jobs;
mod news;
mod registry;
mod relevance;

pub use feed::{normalize_source_host, parse_entries, NormalizedEntry};
pub use jobs::JobBoardAdapter;
pub use news::NewsFeedAdapter;
pub use registry::default_adapters;
pub use relevance::RelevanceFilter;

use async_trait::async_trait;
use chrono::Utc;
use scrapecore_fetch::Fetcher;
use scrapecore_types::{ContentRecord, RunLogError, RunLogWarning, ScrapeResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_RELEVANCE_MIN: u8 = 50;
pub const DEFAULT_RELEVANCE_MAX: u8 = 60;

/// Shared state an adapter needs to run, held by the orchestrator and
/// passed to every adapter invocation rather than threaded through a
/// global (spec.md §9: "a small interface... rather than an inheritance
/// chain").
pub struct AdapterContext {
    pub fetcher: Arc<Fetcher>,
    pub cancellation: CancellationToken,
}

/// What one adapter run produced, including the per-URL telemetry the
/// orchestrator folds into the `RunLog` (spec.md §4.6 `results`,
/// `errors[]`, `warnings[]`). A single fetch failure never aborts the run —
/// the adapter records it here and moves to the next URL.
#[derive(Debug, Default)]
pub struct AdapterRunOutcome {
    pub records: Vec<ContentRecord>,
    pub urls_processed: u64,
    pub urls_failed: u64,
    pub errors: Vec<RunLogError>,
    pub warnings: Vec<RunLogWarning>,
}

impl AdapterRunOutcome {
    /// Records a robots-denied URL as a warning, not an error (spec.md §8
    /// scenario 3: "0 records persisted; `warnings[]` non-empty").
    pub fn record_robots_denied(&mut self, url: &str) {
        self.urls_processed += 1;
        self.urls_failed += 1;
        self.warnings.push(RunLogWarning {
            timestamp: Utc::now(),
            message: "robots.txt disallows this URL".to_string(),
            url: Some(url.to_string()),
        });
    }

    /// Records any other fetch or parse failure for `url`.
    pub fn record_failure(&mut self, url: &str, err: &scrapecore_types::ScrapeError) {
        self.urls_processed += 1;
        self.urls_failed += 1;
        self.errors.push(RunLogError {
            timestamp: Utc::now(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            url: Some(url.to_string()),
            stack: None,
            retry_count: retry_count_of(err),
        });
    }

    /// Records one failed-and-retried attempt against `url` without marking
    /// the URL itself as failed — the fetch may still succeed on a later
    /// attempt (spec.md §8 scenario 4: a URL that fails twice before
    /// succeeding records two `errors[]` entries with `retryCount` 1 and 2).
    pub fn record_retry(&mut self, url: &str, retry_count: u32, err: &scrapecore_types::ScrapeError) {
        self.errors.push(RunLogError {
            timestamp: Utc::now(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            url: Some(url.to_string()),
            stack: None,
            retry_count,
        });
    }

    pub fn record_success(&mut self) {
        self.urls_processed += 1;
    }
}

fn retry_count_of(err: &scrapecore_types::ScrapeError) -> u32 {
    match err {
        scrapecore_types::ScrapeError::FetchExhausted { attempts, .. } => attempts.saturating_sub(1),
        _ => 0,
    }
}

/// Abstract capability: `run() -> batch` (spec.md §4.4).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The adapter's own key, e.g. `"news"` — stable, used for routing
    /// (`startSpecific(name)`) and as `RunLog.adapter_name`/`scraperName`.
    fn name(&self) -> &str;

    /// The human-readable feed/source name this adapter was registered with
    /// (spec.md §3 RunLog `source label`), independent of `name()`.
    fn source_label(&self) -> &str;

    /// The origin URL this adapter's records were drawn from, if the
    /// adapter has a single one. An adapter polling several feeds has no
    /// single origin and returns an empty string.
    fn source_origin(&self) -> &str {
        ""
    }

    async fn run(&self, ctx: &AdapterContext) -> ScrapeResult<AdapterRunOutcome>;
}

/// Pushes `candidate` onto `batch` if it passes the adapter's filter
/// (spec.md §4.4's `addItem`): drops items missing a title or URL, then
/// keeps only candidates whose corpus matches at least one configured
/// keyword. Returns whether the candidate was kept.
pub fn add_item(batch: &mut Vec<ContentRecord>, mut candidate: ContentRecord, filter: &RelevanceFilter) -> bool {
    if candidate.title.trim().is_empty() || candidate.url.trim().is_empty() {
        return false;
    }
    let hits = filter.matches(&candidate);
    if hits.is_empty() {
        return false;
    }
    candidate.keyword_hits = hits;
    batch.push(candidate);
    true
}
