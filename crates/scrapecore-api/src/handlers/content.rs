//! `/api/content/*` handlers (spec.md §6): browse, moderate, and clean up
//! persisted `ContentRecord`s.

use crate::dto::{ok, ok_paginated, ContentListQueryParams, Pagination, PatchStatusRequest};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scrapecore_store::ContentListQuery;
use serde_json::{json, Value};

pub async fn list(State(state): State<AppState>, Query(q): Query<ContentListQueryParams>) -> ApiResult<Json<Value>> {
    let order_desc = !matches!(q.order, crate::dto::Order::Asc);
    let query = ContentListQuery {
        page: q.page,
        limit: q.limit,
        category: q.category,
        source_host: q.source.clone(),
        tags: ContentListQueryParams::split_csv(&q.tags),
        keywords: ContentListQueryParams::split_csv(&q.keywords),
        status: q.status,
        min_relevance: q.min_relevance,
        max_age_days: q.max_age_days,
        search: q.search.clone(),
        sort: q.sort.clone(),
        order_desc,
    };
    let (records, total) = state.content_store.list(&query).await.map_err(ApiError::from)?;
    Ok(Json(ok_paginated(records, Pagination::new(q.page, q.limit, total))))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let record = state
        .content_store
        .get_and_record_view(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no content record with id {id}")))?;
    Ok(Json(ok(record)))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let deleted = state.content_store.delete(&id).await.map_err(ApiError::from)?;
    if !deleted {
        return Err(ApiError::NotFound(format!("no content record with id {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn patch_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PatchStatusRequest>,
) -> ApiResult<Json<Value>> {
    let record = state
        .content_store
        .patch_status(&id, req.status)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no content record with id {id}")))?;
    Ok(Json(ok(record)))
}

pub async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deleted = state
        .content_store
        .cleanup(state.config.content_max_age_days as u32)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(ok(json!({ "deleted": deleted }))))
}

pub async fn stats_overview(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let overview = state.content_store.stats_overview().await.map_err(ApiError::from)?;
    Ok(Json(ok(json!({
        "total": overview.total,
        "byType": overview.by_type,
        "topSources": overview.top_sources,
    }))))
}
