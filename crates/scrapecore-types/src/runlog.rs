use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `status ∈ {pending,running,completed,failed,cancelled,partial}`
/// (spec.md §8 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Partial,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Partial
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Manual,
    Scheduled,
    Api,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounters {
    pub found: u64,
    pub inserted: u64,
    pub updated: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub urls_processed: u64,
    pub urls_failed: u64,
}

impl ResultCounters {
    pub fn merge(&mut self, delta: &ResultCounters) {
        self.found += delta.found;
        self.inserted += delta.inserted;
        self.updated += delta.updated;
        self.duplicates += delta.duplicates;
        self.failed += delta.failed;
        self.urls_processed += delta.urls_processed;
        self.urls_failed += delta.urls_failed;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub avg_time_per_item_ms: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
    pub data_transferred_bytes: u64,
    pub memory_usage_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSummary {
    pub was_throttled: bool,
    pub throttle_count: u64,
    pub total_delay_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsSummary {
    pub checked: u64,
    pub urls_blocked: u64,
    pub crawl_delay_applied: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogError {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub url: Option<String>,
    pub stack: Option<String>,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogWarning {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub url: Option<String>,
}

/// Snapshot of the configuration that produced this run, for audit / replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfigSnapshot {
    pub max_items_per_category: u32,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub user_agent: String,
    pub keywords: Vec<String>,
}

/// One scraping session, bracketed by `start_session` / a terminal
/// transition (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub session_id: String,
    pub adapter_name: String,
    pub source_label: String,
    pub source_origin: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub results: ResultCounters,
    pub performance: PerformanceCounters,
    pub errors: Vec<RunLogError>,
    pub warnings: Vec<RunLogWarning>,
    pub config: RunConfigSnapshot,
    pub trigger: TriggerSource,
    pub triggered_by: Option<String>,
    pub rate_limiting: RateLimitSummary,
    pub robots: RobotsSummary,
}

impl RunLog {
    pub fn start(
        session_id: String,
        adapter_name: String,
        source_label: String,
        source_origin: String,
        config: RunConfigSnapshot,
        trigger: TriggerSource,
        triggered_by: Option<String>,
    ) -> Self {
        Self {
            session_id,
            adapter_name,
            source_label,
            source_origin,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            results: ResultCounters::default(),
            performance: PerformanceCounters::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            config,
            trigger,
            triggered_by,
            rate_limiting: RateLimitSummary::default(),
            robots: RobotsSummary::default(),
        }
    }

    /// No transition may be reversed; double terminal transitions are
    /// ignored (first wins) — spec.md §4.6.
    fn close(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0));
    }

    /// `running → completed` (or `partial` if any URL failed), merging
    /// final counters.
    pub fn complete(&mut self, results: ResultCounters) {
        if self.status.is_terminal() {
            return;
        }
        self.results.merge(&results);
        let status = if self.results.failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        };
        self.close(status);
    }

    pub fn fail(&mut self, error: RunLogError) {
        self.add_error(error);
        self.close(RunStatus::Failed);
    }

    pub fn cancel(&mut self) {
        self.close(RunStatus::Cancelled);
    }

    pub fn update_results(&mut self, delta: ResultCounters) {
        self.results.merge(&delta);
    }

    pub fn add_error(&mut self, error: RunLogError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: RunLogWarning) {
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunLog {
        RunLog::start(
            "sess-1".into(),
            "news".into(),
            "Example News".into(),
            "https://example.com".into(),
            RunConfigSnapshot::default(),
            TriggerSource::Manual,
            None,
        )
    }

    #[test]
    fn complete_sets_duration_and_status() {
        let mut log = sample();
        log.complete(ResultCounters {
            found: 2,
            inserted: 2,
            ..Default::default()
        });
        assert_eq!(log.status, RunStatus::Completed);
        assert!(log.ended_at.is_some());
        assert!(log.duration_ms.unwrap() >= 0);
    }

    #[test]
    fn complete_with_failures_is_partial() {
        let mut log = sample();
        log.complete(ResultCounters {
            found: 2,
            inserted: 1,
            failed: 1,
            ..Default::default()
        });
        assert_eq!(log.status, RunStatus::Partial);
    }

    #[test]
    fn terminal_transition_is_first_wins() {
        let mut log = sample();
        log.cancel();
        let ended_at = log.ended_at;
        log.complete(ResultCounters::default());
        assert_eq!(log.status, RunStatus::Cancelled);
        assert_eq!(log.ended_at, ended_at);
    }

    #[test]
    fn empty_feed_completes_with_zero_counters() {
        let mut log = sample();
        log.complete(ResultCounters::default());
        assert_eq!(log.status, RunStatus::Completed);
        assert_eq!(log.results.found, 0);
    }
}
