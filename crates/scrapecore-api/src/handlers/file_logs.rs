//! `GET /api/scraper/file-logs/{filename}` (spec.md §6): tails one of the
//! rotated NDJSON log streams `scrapecore-api` writes (see `logging`).

use crate::dto::{ok, FileLogsQuery};
use crate::errors::{ApiError, ApiResult};
use crate::logging::LOG_DIR;
use axum::extract::{Path, Query};
use axum::Json;
use serde_json::Value;

/// `^[A-Za-z0-9_\-.]+\.log$` (spec.md §6): rejects any path separator or
/// traversal attempt outright rather than canonicalizing and comparing.
fn is_valid_log_filename(name: &str) -> bool {
    name.ends_with(".log")
        && name.len() > 4
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub async fn tail(Path(filename): Path<String>, Query(q): Query<FileLogsQuery>) -> ApiResult<Json<Value>> {
    if !is_valid_log_filename(&filename) {
        return Err(ApiError::NotFound(filename));
    }

    let path = std::path::Path::new(LOG_DIR).join(&filename);
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|_| ApiError::NotFound(filename.clone()))?;

    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(q.max_lines);
    let tail: Vec<&str> = lines[start..].to_vec();

    Ok(Json(ok(tail)))
}
