use chrono::{Duration as ChronoDuration, Utc};
use scrapecore_types::{RunLog, RunStatus, ScrapeError, ScrapeResult};
use serde_json::Value;
use sqlx::PgPool;

#[derive(Debug, Clone, Default)]
pub struct RunLogListQuery {
    pub page: u32,
    pub limit: u32,
    pub scraper_name: Option<String>,
    /// Filters on `RunLog.source_label` (spec.md §6 `GET /api/scraper/logs`
    /// `source` query param), a free-text label rather than the adapter
    /// name `scraper_name` already filters on.
    pub source: Option<String>,
    pub status: Option<RunStatus>,
    pub start_date: Option<chrono::DateTime<Utc>>,
    pub end_date: Option<chrono::DateTime<Utc>>,
}

/// Persistence boundary for `RunLog` (spec.md §4.6 supplement): the state
/// machine itself stays pure in `scrapecore-runlog`; this type only reads
/// and writes whole documents.
pub struct RunLogRepository {
    pool: PgPool,
}

impl RunLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, log: &RunLog) -> ScrapeResult<()> {
        let data = serde_json::to_value(log).map_err(|e| ScrapeError::Internal(e.to_string()))?;
        sqlx::query(
            "INSERT INTO run_logs (session_id, data, status, scraper_name, started_at, ended_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (session_id) DO UPDATE SET
                data = EXCLUDED.data,
                status = EXCLUDED.status,
                ended_at = EXCLUDED.ended_at,
                updated_at = now()",
        )
        .bind(&log.session_id)
        .bind(&data)
        .bind(status_str(log.status))
        .bind(&log.adapter_name)
        .bind(log.started_at)
        .bind(log.ended_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> ScrapeResult<Option<RunLog>> {
        let row: Option<Value> = sqlx::query_scalar("SELECT data FROM run_logs WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(|v| serde_json::from_value(v).map_err(|e| ScrapeError::Internal(e.to_string())))
            .transpose()
    }

    pub async fn list(&self, query: &RunLogListQuery) -> ScrapeResult<(Vec<RunLog>, i64)> {
        let limit = query.limit.max(1) as i64;
        let offset = (query.page.saturating_sub(1) as i64) * limit;

        let mut builder = sqlx::QueryBuilder::new("SELECT data FROM run_logs WHERE 1=1");
        let mut count_builder = sqlx::QueryBuilder::new("SELECT count(*) FROM run_logs WHERE 1=1");
        for b in [&mut builder, &mut count_builder] {
            if let Some(scraper_name) = &query.scraper_name {
                b.push(" AND scraper_name = ").push_bind(scraper_name.clone());
            }
            if let Some(source) = &query.source {
                b.push(" AND data->>'source_label' = ").push_bind(source.clone());
            }
            if let Some(status) = query.status {
                b.push(" AND status = ").push_bind(status_str(status));
            }
            if let Some(start) = query.start_date {
                b.push(" AND started_at >= ").push_bind(start);
            }
            if let Some(end) = query.end_date {
                b.push(" AND started_at <= ").push_bind(end);
            }
        }

        builder.push(" ORDER BY started_at DESC LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

        let rows: Vec<Value> = builder.build_query_scalar().fetch_all(&self.pool).await.map_err(store_err)?;
        let logs = rows
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| ScrapeError::Internal(e.to_string())))
            .collect::<ScrapeResult<Vec<_>>>()?;

        let total: i64 = count_builder.build_query_scalar().fetch_one(&self.pool).await.map_err(store_err)?;

        Ok((logs, total))
    }

    /// 30-day TTL expiry of closed run logs (spec.md §6 "30-day TTL"),
    /// reimplemented as a maintenance-tick sweep since Postgres has no
    /// native per-row TTL the way a Mongo TTL index would.
    pub async fn cleanup_run_logs(&self, retention_days: i64) -> ScrapeResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(retention_days);
        let result = sqlx::query("DELETE FROM run_logs WHERE ended_at IS NOT NULL AND ended_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Partial => "partial",
    }
}

fn store_err(err: sqlx::Error) -> ScrapeError {
    ScrapeError::StoreError(err.to_string())
}
