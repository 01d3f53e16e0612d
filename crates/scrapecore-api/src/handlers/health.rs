use crate::dto::ok;
use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// `GET /health` (spec.md §6: "liveness; returns uptime and store
/// connectivity"): pings the content store's pool with `SELECT 1` so a
/// readiness probe catches a dead database before traffic does.
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.content_store.pool())
        .await
        .is_ok();

    Ok(Json(ok(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))))
}
