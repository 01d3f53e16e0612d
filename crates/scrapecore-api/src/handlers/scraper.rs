//! `/api/scraper/*` handlers (spec.md §6): control and observe `Scraper`
//! runs, modeled on the teacher's `handlers/admin.rs` function shape.

use crate::dto::{ok, ok_paginated, Pagination, ScraperLogsQuery, ScraperStatsQuery, StartRunRequest};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scrapecore_store::RunLogListQuery;
use scrapecore_types::{RunLog, RunStatus, TriggerSource};
use serde_json::{json, Value};
use tracing::info;

pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(ok(state.scraper.status().await)))
}

pub async fn types(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(ok(state.scraper.adapter_names())))
}

/// `POST /api/scraper/start`: 202 Accepted, since the run continues after
/// the response; 409 if a run is already in progress (spec.md §6 status
/// codes). The "already running" check is awaited synchronously — only the
/// run itself continues on a detached task — so the conflict is visible in
/// the response rather than only in `tracing::error!`.
pub async fn start_all(
    State(state): State<AppState>,
    req: Option<Json<StartRunRequest>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let triggered_by = req.and_then(|Json(r)| r.triggered_by);
    info!(?triggered_by, "scraper start requested via api");
    state.scraper.spawn_all(TriggerSource::Api, triggered_by).await.map_err(ApiError::from)?;
    Ok((StatusCode::ACCEPTED, Json(ok(json!({ "message": "scrape started" })))))
}

pub async fn start_specific(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Option<Json<StartRunRequest>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if !state.scraper.adapter_names().contains(&name) {
        return Err(ApiError::NotFound(format!("no such adapter: {name}")));
    }
    let triggered_by = req.and_then(|Json(r)| r.triggered_by);
    state
        .scraper
        .spawn_specific(&name, TriggerSource::Api, triggered_by)
        .await
        .map_err(ApiError::from)?;
    Ok((StatusCode::ACCEPTED, Json(ok(json!({ "message": format!("scrape started for {name}") })))))
}

pub async fn stop_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.scraper.stop_all().await;
    Ok(Json(ok(json!({ "message": "stop requested" }))))
}

pub async fn list_logs(State(state): State<AppState>, Query(q): Query<ScraperLogsQuery>) -> ApiResult<Json<Value>> {
    let query = RunLogListQuery {
        page: q.page,
        limit: q.limit,
        scraper_name: q.scraper_name,
        source: q.source,
        status: q.status,
        start_date: q.start_date,
        end_date: q.end_date,
    };
    let (logs, total) = state.run_logs.list(&query).await.map_err(ApiError::from)?;
    Ok(Json(ok_paginated(logs, Pagination::new(q.page, q.limit, total))))
}

pub async fn get_log(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let log: RunLog = state
        .run_logs
        .get(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no run log with id {id}")))?;
    Ok(Json(ok(log)))
}

/// `GET /api/scraper/stats?days=7` (spec.md §6): aggregates run-level
/// counters over the trailing window rather than exposing a separate
/// stats table.
pub async fn stats(State(state): State<AppState>, Query(q): Query<ScraperStatsQuery>) -> ApiResult<Json<Value>> {
    let start_date = chrono::Utc::now() - chrono::Duration::days(q.days as i64);
    let (logs, total) = state
        .run_logs
        .list(&RunLogListQuery {
            page: 1,
            limit: 10_000,
            start_date: Some(start_date),
            ..Default::default()
        })
        .await
        .map_err(ApiError::from)?;

    let completed = logs.iter().filter(|l| l.status == RunStatus::Completed).count();
    let failed = logs.iter().filter(|l| l.status == RunStatus::Failed).count();
    let total_inserted: u64 = logs.iter().map(|l| l.results.inserted).sum();
    let total_found: u64 = logs.iter().map(|l| l.results.found).sum();

    Ok(Json(ok(json!({
        "days": q.days,
        "totalRuns": total,
        "completed": completed,
        "failed": failed,
        "totalInserted": total_inserted,
        "totalFound": total_found,
    }))))
}
