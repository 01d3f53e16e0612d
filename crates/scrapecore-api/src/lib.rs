//! Admin HTTP surface (spec.md §6): scraper control, content browsing, and
//! structured file-log access, grounded on `riptide-api`'s router/layer
//! composition in its `main.rs`.

pub mod dto;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::Router;
use state::AppState;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/scraper/status", get(handlers::scraper::status))
        .route("/api/scraper/types", get(handlers::scraper::types))
        .route("/api/scraper/start", post(handlers::scraper::start_all))
        .route("/api/scraper/start/:name", post(handlers::scraper::start_specific))
        .route("/api/scraper/stop", post(handlers::scraper::stop_all))
        .route("/api/scraper/logs", get(handlers::scraper::list_logs))
        .route("/api/scraper/logs/:id", get(handlers::scraper::get_log))
        .route("/api/scraper/stats", get(handlers::scraper::stats))
        .route("/api/scraper/file-logs/:filename", get(handlers::file_logs::tail))
        .route("/api/content", get(handlers::content::list))
        .route("/api/content/:id", get(handlers::content::get).delete(handlers::content::delete))
        .route("/api/content/:id/status", patch(handlers::content::patch_status))
        .route("/api/content/cleanup", post(handlers::content::cleanup))
        .route("/api/content/stats/overview", get(handlers::content::stats_overview))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
}
