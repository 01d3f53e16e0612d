//! Orchestrator: the explicit `Scraper` value spec.md §9 asks for in place
//! of a hidden global singleton. Owns every component's `Arc` handle, the
//! adapter registry, and the mutable run-state the teacher's
//! `riptide-workers::service::WorkerService` keeps for its job queue.

mod scheduler;
mod status;

pub use scheduler::CronScheduler;
pub use status::{AdapterStatusEntry, GateStats, OrchestratorStatus, OverallCounters};

use chrono::Utc;
use scrapecore_adapters::{AdapterContext, SourceAdapter};
use scrapecore_fetch::Fetcher;
use scrapecore_ratelimit::{ConcurrencyGate, RateLimiter};
use scrapecore_robots::RobotsCache;
use scrapecore_runlog::RunLogHandle;
use scrapecore_store::{ContentStore, RunLogRepository};
use scrapecore_types::{
    AppConfig, ResultCounters, RunConfigSnapshot, RunLogError, RunStatus, ScrapeError, ScrapeResult,
    TriggerSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 30-day retention for closed `RunLog`s (spec.md §4.6 supplement), applied
/// by the same maintenance tick that runs `ContentStore::cleanup`.
const RUN_LOG_RETENTION_DAYS: i64 = 30;

struct OrchestratorState {
    is_running: bool,
    adapters: HashMap<String, status::AdapterStatusEntry>,
    last_run: Option<chrono::DateTime<Utc>>,
    counters: status::OverallCounters,
}

pub struct Scraper {
    config: Arc<AppConfig>,
    fetcher: Arc<Fetcher>,
    robots: Arc<RobotsCache>,
    limiter: Arc<RateLimiter>,
    gate: Arc<ConcurrencyGate>,
    content_store: Arc<ContentStore>,
    run_logs: Arc<RunLogRepository>,
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    state: Mutex<OrchestratorState>,
    cancellation: Mutex<CancellationToken>,
}

impl Scraper {
    pub fn new(
        config: Arc<AppConfig>,
        fetcher: Arc<Fetcher>,
        robots: Arc<RobotsCache>,
        limiter: Arc<RateLimiter>,
        gate: Arc<ConcurrencyGate>,
        content_store: Arc<ContentStore>,
        run_logs: Arc<RunLogRepository>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        let mut by_name = HashMap::new();
        let mut initial_status = HashMap::new();
        for adapter in adapters {
            let name = adapter.name().to_string();
            initial_status.insert(name.clone(), status::AdapterStatusEntry::idle());
            by_name.insert(name, adapter);
        }
        Self {
            config,
            fetcher,
            robots,
            limiter,
            gate,
            content_store,
            run_logs,
            adapters: by_name,
            state: Mutex::new(OrchestratorState {
                is_running: false,
                adapters: initial_status,
                last_run: None,
                counters: status::OverallCounters::default(),
            }),
            cancellation: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// `startAll(trigger)` (spec.md §4.7): rejects if already running, runs
    /// every registered adapter as an independent parallel task, then
    /// invokes store cleanup once every task has reached a terminal state.
    pub async fn start_all(self: &Arc<Self>, trigger: TriggerSource, triggered_by: Option<String>) -> ScrapeResult<()> {
        self.begin_run().await?;
        self.run_all_adapters(trigger, triggered_by).await;
        Ok(())
    }

    /// Like `start_all`, but only awaits the "already running" check —
    /// the run itself continues on a detached task. Lets the HTTP layer
    /// return 409 synchronously without blocking the response on the full
    /// run (spec.md §6 `POST /api/scraper/start`).
    pub async fn spawn_all(self: &Arc<Self>, trigger: TriggerSource, triggered_by: Option<String>) -> ScrapeResult<()> {
        self.begin_run().await?;
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_all_adapters(trigger, triggered_by).await });
        Ok(())
    }

    async fn run_all_adapters(self: &Arc<Self>, trigger: TriggerSource, triggered_by: Option<String>) {
        let handles: Vec<_> = self
            .adapters
            .keys()
            .cloned()
            .map(|name| {
                let this = Arc::clone(self);
                let triggered_by = triggered_by.clone();
                tokio::spawn(async move { this.run_adapter(&name, trigger, triggered_by).await })
            })
            .collect();

        for handle in handles {
            if let Err(join_err) = handle.await {
                // Logged under a distinct target so `scrapecore-api`'s
                // `rejections.log` stream can isolate unhandled task
                // failures from ordinary adapter errors.
                error!(target: "task_panic", error = %join_err, "adapter task panicked");
            }
        }

        self.finish_run().await;
    }

    /// `startSpecific(name, trigger)` (spec.md §4.7).
    pub async fn start_specific(
        self: &Arc<Self>,
        name: &str,
        trigger: TriggerSource,
        triggered_by: Option<String>,
    ) -> ScrapeResult<()> {
        if !self.adapters.contains_key(name) {
            return Err(ScrapeError::NotFound(name.to_string()));
        }
        self.begin_run().await?;
        self.run_adapter(name, trigger, triggered_by).await;
        self.finish_run().await;
        Ok(())
    }

    /// Like `start_specific`, but only awaits the "already running"/unknown
    /// adapter checks before returning — see `spawn_all`.
    pub async fn spawn_specific(
        self: &Arc<Self>,
        name: &str,
        trigger: TriggerSource,
        triggered_by: Option<String>,
    ) -> ScrapeResult<()> {
        if !self.adapters.contains_key(name) {
            return Err(ScrapeError::NotFound(name.to_string()));
        }
        self.begin_run().await?;
        let this = Arc::clone(self);
        let name = name.to_string();
        tokio::spawn(async move {
            this.run_adapter(&name, trigger, triggered_by).await;
            this.finish_run().await;
        });
        Ok(())
    }

    /// `stopAll` (spec.md §4.7): cooperative — flips the flag and the
    /// shared cancellation token; in-flight tasks observe it at their next
    /// suspension point.
    pub async fn stop_all(&self) {
        let mut state = self.state.lock().await;
        state.is_running = false;
        for entry in state.adapters.values_mut() {
            if entry.status == RunStatus::Running {
                entry.status = RunStatus::Cancelled;
                entry.end_time = Some(Utc::now());
            }
        }
        drop(state);
        self.cancellation.lock().await.cancel();
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.state.lock().await;
        OrchestratorStatus {
            is_running: state.is_running,
            adapters: state.adapters.clone(),
            last_run: state.last_run,
            counters: state.counters.clone(),
            rate_limit: self.limiter.stats(),
            gate: GateStats {
                capacity: self.gate.capacity(),
                in_flight: self.gate.current_in_flight(),
                queue_length: self.gate.queue_length(),
            },
            robots: self.robots.stats(),
        }
    }

    /// The periodic maintenance tick named in spec.md §4.6/§4.5: physical
    /// deletion of aged content and closed run logs. Independent of
    /// `start_all`'s post-run cleanup so a long `AUTO_SCRAPE_ENABLED=false`
    /// deployment still ages records out.
    pub async fn run_maintenance_tick(&self) {
        match self.content_store.cleanup(self.config.content_max_age_days as u32).await {
            Ok(deleted) => info!(deleted, "content cleanup tick"),
            Err(err) => error!(error = %err, "content cleanup failed"),
        }
        match self.content_store.expire_ttl().await {
            Ok(deleted) => info!(deleted, "content ttl sweep tick"),
            Err(err) => error!(error = %err, "content ttl sweep failed"),
        }
        match self.run_logs.cleanup_run_logs(RUN_LOG_RETENTION_DAYS).await {
            Ok(deleted) => info!(deleted, "run log cleanup tick"),
            Err(err) => error!(error = %err, "run log cleanup failed"),
        }
    }

    async fn begin_run(&self) -> ScrapeResult<()> {
        let mut state = self.state.lock().await;
        if state.is_running {
            return Err(ScrapeError::AlreadyRunning);
        }
        state.is_running = true;
        state.counters = status::OverallCounters::default();
        for entry in state.adapters.values_mut() {
            *entry = status::AdapterStatusEntry::idle();
        }
        drop(state);

        self.limiter.reset_stats();
        *self.cancellation.lock().await = CancellationToken::new();
        Ok(())
    }

    async fn finish_run(&self) {
        let mut state = self.state.lock().await;
        state.is_running = false;
        state.last_run = Some(Utc::now());
    }

    async fn run_adapter(&self, name: &str, trigger: TriggerSource, triggered_by: Option<String>) {
        let Some(adapter) = self.adapters.get(name) else {
            return;
        };

        {
            let mut state = self.state.lock().await;
            state.adapters.insert(name.to_string(), status::AdapterStatusEntry::started());
        }

        let cancellation = self.cancellation.lock().await.clone();
        let config_snapshot = RunConfigSnapshot {
            max_items_per_category: self.config.max_items_per_category,
            delay_min_ms: self.config.scrape_delay_min.as_millis() as u64,
            delay_max_ms: self.config.scrape_delay_max.as_millis() as u64,
            timeout_ms: self.config.request_timeout.as_millis() as u64,
            max_retries: self.config.max_retries,
            user_agent: self.config.robots_user_agent.clone(),
            keywords: self.config.search_keywords.clone(),
        };
        let handle = RunLogHandle::start(
            name.to_string(),
            adapter.source_label().to_string(),
            adapter.source_origin().to_string(),
            config_snapshot,
            trigger,
            triggered_by,
        );
        if let Err(err) = self.run_logs.save(&handle.snapshot().await).await {
            warn!(adapter = name, error = %err, "failed to persist initial run log");
        }

        let ctx = AdapterContext {
            fetcher: Arc::clone(&self.fetcher),
            cancellation: cancellation.clone(),
        };

        let snapshot = match adapter.run(&ctx).await {
            Ok(outcome) => {
                let upsert = if outcome.records.is_empty() {
                    scrapecore_store::BulkUpsertResult::default()
                } else {
                    match self.content_store.bulk_upsert(&outcome.records, self.config.content_max_age_days as u32).await {
                        Ok(result) => result,
                        Err(err) => {
                            warn!(adapter = name, error = %err, "bulk upsert failed");
                            scrapecore_store::BulkUpsertResult::default()
                        }
                    }
                };

                let results = ResultCounters {
                    found: outcome.records.len() as u64,
                    inserted: upsert.inserted as u64,
                    updated: upsert.modified as u64,
                    duplicates: upsert.duplicates as u64,
                    failed: outcome.urls_failed,
                    urls_processed: outcome.urls_processed,
                    urls_failed: outcome.urls_failed,
                };

                for error in outcome.errors {
                    handle.add_error(error).await;
                }
                for warning in outcome.warnings {
                    handle.add_warning(warning).await;
                }

                let snapshot = if cancellation.is_cancelled() {
                    handle.cancel().await
                } else {
                    handle.complete(results.clone()).await
                };

                let mut state = self.state.lock().await;
                state.counters.total_scraped += results.found;
                state.counters.total_inserted += results.inserted;
                state.counters.total_errors += results.failed;
                snapshot
            }
            Err(err) => {
                warn!(adapter = name, error = %err, "adapter run failed");
                let snapshot = handle
                    .fail(RunLogError {
                        timestamp: Utc::now(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                        url: None,
                        stack: None,
                        retry_count: 0,
                    })
                    .await;
                let mut state = self.state.lock().await;
                state.counters.total_errors += 1;
                snapshot
            }
        };

        if let Err(err) = self.run_logs.save(&snapshot).await {
            error!(adapter = name, error = %err, "failed to persist run log");
        }

        let mut state = self.state.lock().await;
        state.adapters.insert(
            name.to_string(),
            status::AdapterStatusEntry {
                status: snapshot.status,
                start_time: Some(snapshot.started_at),
                end_time: snapshot.ended_at,
                error: snapshot.errors.last().map(|e| e.message.clone()),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_entry_starts_pending() {
        let entry = status::AdapterStatusEntry::idle();
        assert_eq!(entry.status, RunStatus::Pending);
        assert!(entry.start_time.is_none());
    }

    #[test]
    fn started_entry_records_a_start_time() {
        let entry = status::AdapterStatusEntry::started();
        assert_eq!(entry.status, RunStatus::Running);
        assert!(entry.start_time.is_some());
    }
}
