//! Content Store and Run Log repository: Postgres-backed JSONB document
//! stores (spec.md §4.5, §4.6).

mod content_store;
mod runlog_repository;

pub use content_store::{BulkUpsertResult, ContentListQuery, ContentStatsOverview, ContentStore};
pub use runlog_repository::{RunLogListQuery, RunLogRepository};
