//! `RunLogHandle`: a pure, in-memory mutation surface over `RunLog`
//! (spec.md §4.6). Persistence is the orchestrator's job — it flushes the
//! snapshot this handle returns after each mutating call to
//! `scrapecore-store::RunLogRepository`, the same split the teacher keeps
//! between a job's in-memory state and its queue-backed persistence.

use scrapecore_types::{
    RunConfigSnapshot, RunLog, RunLogError, RunLogWarning, ResultCounters, TriggerSource,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct RunLogHandle {
    inner: Arc<Mutex<RunLog>>,
}

impl RunLogHandle {
    /// `pending → running`: starts a new session with a fresh UUID
    /// session id (spec.md §4.6 `startSession`).
    pub fn start(
        adapter_name: String,
        source_label: String,
        source_origin: String,
        config: RunConfigSnapshot,
        trigger: TriggerSource,
        triggered_by: Option<String>,
    ) -> Self {
        let log = RunLog::start(
            Uuid::new_v4().to_string(),
            adapter_name,
            source_label,
            source_origin,
            config,
            trigger,
            triggered_by,
        );
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    pub fn from_existing(log: RunLog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    pub async fn session_id(&self) -> String {
        self.inner.lock().await.session_id.clone()
    }

    pub async fn snapshot(&self) -> RunLog {
        self.inner.lock().await.clone()
    }

    pub async fn update_results(&self, delta: ResultCounters) -> RunLog {
        let mut log = self.inner.lock().await;
        log.update_results(delta);
        log.clone()
    }

    pub async fn add_error(&self, error: RunLogError) -> RunLog {
        let mut log = self.inner.lock().await;
        log.add_error(error);
        log.clone()
    }

    pub async fn add_warning(&self, warning: RunLogWarning) -> RunLog {
        let mut log = self.inner.lock().await;
        log.add_warning(warning);
        log.clone()
    }

    pub async fn complete(&self, results: ResultCounters) -> RunLog {
        let mut log = self.inner.lock().await;
        log.complete(results);
        log.clone()
    }

    pub async fn fail(&self, error: RunLogError) -> RunLog {
        let mut log = self.inner.lock().await;
        log.fail(error);
        log.clone()
    }

    pub async fn cancel(&self) -> RunLog {
        let mut log = self.inner.lock().await;
        log.cancel();
        log.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapecore_types::RunStatus;

    fn handle() -> RunLogHandle {
        RunLogHandle::start(
            "news".to_string(),
            "Example News".to_string(),
            "https://example.com".to_string(),
            RunConfigSnapshot::default(),
            TriggerSource::Manual,
            None,
        )
    }

    #[tokio::test]
    async fn start_produces_a_unique_session_id() {
        let a = handle();
        let b = handle();
        assert_ne!(a.session_id().await, b.session_id().await);
    }

    #[tokio::test]
    async fn complete_transitions_and_returns_snapshot() {
        let handle = handle();
        let snapshot = handle
            .complete(ResultCounters {
                found: 3,
                inserted: 3,
                ..Default::default()
            })
            .await;
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(handle.snapshot().await.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_mutations_serialize_through_the_mutex() {
        let handle = handle();
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .update_results(ResultCounters {
                        found: 1,
                        ..Default::default()
                    })
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(handle.snapshot().await.results.found, 10);
    }
}
