//! Cron-driven scheduling, grounded on the teacher's
//! `riptide-workers::scheduler::JobScheduler`: compute the next fire time,
//! sleep until it, trigger a run, repeat.

use crate::Scraper;
use cron::Schedule;
use scrapecore_types::{ScrapeError, ScrapeResult, TriggerSource};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives `Scraper::start_all(Scheduled)` on a `cron`-expression cadence
/// (spec.md §6 `SCRAPE_CRON_SCHEDULE`, consumed by `scrapecore-cli`'s
/// standalone worker process when `AUTO_SCRAPE_ENABLED=true`).
pub struct CronScheduler {
    scraper: Arc<Scraper>,
    schedule: Schedule,
    cancellation: CancellationToken,
}

impl CronScheduler {
    pub fn new(scraper: Arc<Scraper>, cron_expression: &str) -> ScrapeResult<Self> {
        let schedule = Schedule::from_str(cron_expression)
            .map_err(|e| ScrapeError::Config(format!("invalid cron expression {cron_expression:?}: {e}")))?;
        Ok(Self {
            scraper,
            schedule,
            cancellation: CancellationToken::new(),
        })
    }

    /// Runs until `stop()` is called. Each tick that arrives while a run is
    /// still in flight is skipped with a warning rather than queued.
    pub async fn run(&self) {
        loop {
            let Some(next) = self.schedule.upcoming(chrono::Utc).next() else {
                error!("cron schedule has no upcoming fire time, stopping scheduler");
                return;
            };
            let wait = (next - chrono::Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.cancellation.cancelled() => return,
            }

            info!(fire_time = %next, "cron schedule firing scheduled run");
            match self.scraper.start_all(TriggerSource::Scheduled, None).await {
                Ok(()) => {}
                Err(ScrapeError::AlreadyRunning) => {
                    warn!("scheduled run skipped: a run was already in progress");
                }
                Err(err) => error!(error = %err, "scheduled run failed to start"),
            }
        }
    }

    pub fn stop(&self) {
        self.cancellation.cancel();
    }
}
