use chrono::{DateTime, Utc};
use scrapecore_ratelimit::RateLimiterStats;
use scrapecore_robots::RobotsCacheStats;
use scrapecore_types::RunStatus;
use serde::Serialize;
use std::collections::HashMap;

/// One entry in the orchestrator's adapter map (spec.md §4.7: `adapterName
/// → {status, startTime, endTime?, error?}`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatusEntry {
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AdapterStatusEntry {
    pub fn idle() -> Self {
        Self {
            status: RunStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
        }
    }

    pub fn started() -> Self {
        Self {
            status: RunStatus::Running,
            start_time: Some(Utc::now()),
            end_time: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCounters {
    pub total_scraped: u64,
    pub total_inserted: u64,
    pub total_errors: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStats {
    pub capacity: usize,
    pub in_flight: usize,
    pub queue_length: usize,
}

/// Full `status()` snapshot (spec.md §4.7): adapter map, overall counters,
/// and live limiter/gate/robots stats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub adapters: HashMap<String, AdapterStatusEntry>,
    pub last_run: Option<DateTime<Utc>>,
    pub counters: OverallCounters,
    pub rate_limit: RateLimiterStats,
    pub gate: GateStats,
    pub robots: RobotsCacheStats,
}
