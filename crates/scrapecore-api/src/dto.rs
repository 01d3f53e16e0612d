//! Request/response shapes for the admin HTTP surface (spec.md §6).

use chrono::{DateTime, Utc};
use scrapecore_types::{ContentCategory, ContentStatus, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let pages = if limit == 0 { 0 } else { (total + limit as i64 - 1) / limit as i64 };
        Self { page, limit, total, pages }
    }
}

/// `{success:true, data}`, the counterpart of `ApiError`'s envelope.
pub fn ok<T: Serialize>(data: T) -> Value {
    json!({ "success": true, "data": data })
}

pub fn ok_paginated<T: Serialize>(data: T, pagination: Pagination) -> Value {
    json!({ "success": true, "data": data, "pagination": pagination })
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub triggered_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScraperLogsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub scraper_name: Option<String>,
    pub source: Option<String>,
    pub status: Option<RunStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn default_stats_days() -> u32 {
    7
}

#[derive(Debug, Deserialize)]
pub struct ScraperStatsQuery {
    #[serde(default = "default_stats_days")]
    pub days: u32,
}

fn default_max_lines() -> usize {
    500
}

#[derive(Debug, Deserialize)]
pub struct FileLogsQuery {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

#[derive(Debug, Deserialize)]
pub struct ContentListQueryParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(rename = "type")]
    pub category: Option<ContentCategory>,
    pub source: Option<String>,
    pub tags: Option<String>,
    pub keywords: Option<String>,
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Order,
    pub search: Option<String>,
    pub status: Option<ContentStatus>,
    pub min_relevance: Option<u8>,
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Desc,
    Asc,
}

#[derive(Debug, Deserialize)]
pub struct PatchStatusRequest {
    pub status: ContentStatus,
}

impl ContentListQueryParams {
    pub fn split_csv(raw: &Option<String>) -> Vec<String> {
        raw.as_deref()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}
