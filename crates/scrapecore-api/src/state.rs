//! `AppState`: the handle bundle every handler receives, built once in
//! `main` and cloned per-request the way `riptide-api::state::AppState`
//! does (an `Arc`-wrapped field per shared component, cheap to clone).

use scrapecore_orchestrator::Scraper;
use scrapecore_store::{ContentStore, RunLogRepository};
use scrapecore_types::AppConfig;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub content_store: Arc<ContentStore>,
    pub run_logs: Arc<RunLogRepository>,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}
