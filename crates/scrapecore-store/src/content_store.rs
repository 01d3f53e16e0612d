use chrono::{DateTime, Duration as ChronoDuration, Utc};
use scrapecore_types::{ContentCategory, ContentRecord, ContentStatus, ScrapeError, ScrapeResult};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// `ts_rank` weight array matching title(A)=10, description(B)=5,
/// tags+keywords(C)=3, body(D)=1 (spec.md §4.5).
const SEARCH_RANK_WEIGHTS: &str = "{0.1, 0.3, 0.5, 1.0}";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpsertOutcome {
    Inserted,
    Modified,
    Duplicate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpsertResult {
    pub inserted: usize,
    pub modified: usize,
    pub duplicates: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ContentListQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<ContentCategory>,
    pub source_host: Option<String>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub status: Option<ContentStatus>,
    pub min_relevance: Option<u8>,
    pub max_age_days: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order_desc: bool,
}

#[derive(Debug, Clone)]
pub struct ContentStatsOverview {
    pub total: i64,
    pub by_type: BTreeMap<String, i64>,
    pub top_sources: Vec<(String, i64)>,
}

pub struct ContentStore {
    pool: PgPool,
}

impl ContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> ScrapeResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ScrapeError::StoreError(format!("migration failed: {e}")))
    }

    /// `{inserted, modified, total}` per spec.md §4.5. Records run
    /// concurrently ("unordered execution") so one slow row never blocks
    /// another; any non-duplicate-key store error is fatal to the batch.
    /// `retention_days` seeds `expires_at` on newly inserted, non-exempt
    /// records (spec.md §3: `expires-at = scraped-at + configured
    /// retention`, fixed at insertion, independent of age-based `cleanup`).
    pub async fn bulk_upsert(&self, records: &[ContentRecord], retention_days: u32) -> ScrapeResult<BulkUpsertResult> {
        let total = records.len();
        let outcomes = futures::future::try_join_all(records.iter().map(|r| self.upsert_one(r, retention_days))).await?;

        let mut result = BulkUpsertResult {
            total,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                UpsertOutcome::Inserted => result.inserted += 1,
                UpsertOutcome::Modified => result.modified += 1,
                UpsertOutcome::Duplicate => result.duplicates += 1,
            }
        }
        Ok(result)
    }

    async fn upsert_one(&self, record: &ContentRecord, retention_days: u32) -> ScrapeResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let existing: Option<Value> = sqlx::query_scalar("SELECT data FROM content_records WHERE content_hash = $1 FOR UPDATE")
            .bind(&record.content_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;

        let outcome = match existing {
            None => {
                let mut to_insert = record.clone();
                to_insert.scraped_at = Utc::now();
                to_insert.updated_at = to_insert.scraped_at;
                if to_insert.expires_at.is_none() && !to_insert.is_cleanup_exempt() {
                    to_insert.expires_at = Some(to_insert.scraped_at + ChronoDuration::days(retention_days as i64));
                }
                let data = serde_json::to_value(&to_insert).map_err(|e| ScrapeError::Internal(e.to_string()))?;

                let insert_result = sqlx::query(
                    "INSERT INTO content_records (content_hash, data, category, source_host, status, scraped_at, published_at, expires_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(&to_insert.content_hash)
                .bind(&data)
                .bind(category_str(to_insert.category))
                .bind(&to_insert.source_host)
                .bind(status_str(to_insert.status))
                .bind(to_insert.scraped_at)
                .bind(to_insert.published_at)
                .bind(to_insert.expires_at)
                .execute(&mut *tx)
                .await;

                match insert_result {
                    Ok(_) => {
                        tx.commit().await.map_err(store_err)?;
                        UpsertOutcome::Inserted
                    }
                    Err(e) if is_unique_violation(&e) => {
                        // Lost the insert race to a concurrent writer: the
                        // row now exists, so retry as an update
                        // (Open Question (a): counted as `modified`, not
                        // surfaced as an error).
                        drop(tx);
                        warn!(content_hash = %record.content_hash, "insert lost upsert race, retrying as update");
                        return self.update_existing(record).await;
                    }
                    Err(e) => return Err(store_err(e)),
                }
            }
            Some(old_data) => {
                let (merged, changed) = merge_non_identity_fields(&old_data, record);
                if !changed {
                    tx.commit().await.map_err(store_err)?;
                    UpsertOutcome::Duplicate
                } else {
                    apply_update(&mut tx, record, &merged).await?;
                    tx.commit().await.map_err(store_err)?;
                    UpsertOutcome::Modified
                }
            }
        };

        Ok(outcome)
    }

    async fn update_existing(&self, record: &ContentRecord) -> ScrapeResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let old_data: Value = sqlx::query_scalar("SELECT data FROM content_records WHERE content_hash = $1 FOR UPDATE")
            .bind(&record.content_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;

        let (merged, _changed) = merge_non_identity_fields(&old_data, record);
        apply_update(&mut tx, record, &merged).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(UpsertOutcome::Modified)
    }

    /// Deletes records older than `max_age_days` that aren't `flagged`
    /// (spec.md §4.5 cleanup). Dynamic: re-evaluated against the live
    /// `max_age_days` config on every tick, unlike `expire_ttl`'s
    /// per-record `expires_at` fixed at insertion.
    pub async fn cleanup(&self, max_age_days: u32) -> ScrapeResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(max_age_days as i64);
        let result = sqlx::query("DELETE FROM content_records WHERE scraped_at < $1 AND status <> 'flagged'")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        debug!(deleted = result.rows_affected(), max_age_days, "cleanup deleted aged-out records");
        Ok(result.rows_affected())
    }

    /// Deletes records whose `expires_at` has passed (spec.md §3: "an
    /// independent TTL mechanism on `expiresAt`"), excluding `flagged`
    /// records the same way `cleanup` does.
    pub async fn expire_ttl(&self) -> ScrapeResult<u64> {
        let result = sqlx::query("DELETE FROM content_records WHERE expires_at IS NOT NULL AND expires_at < now() AND status <> 'flagged'")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        debug!(deleted = result.rows_affected(), "ttl sweep deleted expired records");
        Ok(result.rows_affected())
    }

    pub async fn get(&self, content_hash: &str) -> ScrapeResult<Option<ContentRecord>> {
        let row: Option<Value> = sqlx::query_scalar("SELECT data FROM content_records WHERE content_hash = $1")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(deserialize_record).transpose()
    }

    /// Fetches the record and increments its view counter, per spec.md §6
    /// ("side-effect: increment view counter").
    pub async fn get_and_record_view(&self, content_hash: &str) -> ScrapeResult<Option<ContentRecord>> {
        let row: Option<Value> = sqlx::query_scalar(
            "UPDATE content_records
             SET data = jsonb_set(data, '{view_count}', to_jsonb(coalesce((data->>'view_count')::bigint, 0) + 1))
             WHERE content_hash = $1
             RETURNING data",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(deserialize_record).transpose()
    }

    pub async fn delete(&self, content_hash: &str) -> ScrapeResult<bool> {
        let result = sqlx::query("DELETE FROM content_records WHERE content_hash = $1")
            .bind(content_hash)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn patch_status(&self, content_hash: &str, status: ContentStatus) -> ScrapeResult<Option<ContentRecord>> {
        let row: Option<Value> = sqlx::query_scalar(
            "UPDATE content_records
             SET data = jsonb_set(data, '{status}', to_jsonb($2::text)), status = $2, updated_at = now()
             WHERE content_hash = $1
             RETURNING data",
        )
        .bind(content_hash)
        .bind(status_str(status))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(deserialize_record).transpose()
    }

    /// Paginated list; uses free-text ranking when `query.search` is set,
    /// otherwise sorts by the named field (spec.md §6).
    pub async fn list(&self, query: &ContentListQuery) -> ScrapeResult<(Vec<ContentRecord>, i64)> {
        let limit = query.limit.max(1) as i64;
        let offset = (query.page.saturating_sub(1) as i64) * limit;

        let mut builder = sqlx::QueryBuilder::new("SELECT data FROM content_records WHERE 1=1");
        let mut count_builder = sqlx::QueryBuilder::new("SELECT count(*) FROM content_records WHERE 1=1");
        push_filters(&mut builder, query);
        push_filters(&mut count_builder, query);

        if let Some(search) = &query.search {
            builder
                .push(" AND search_vector @@ plainto_tsquery('english', ")
                .push_bind(search)
                .push(")");
            builder
                .push(" ORDER BY ts_rank(")
                .push(SEARCH_RANK_WEIGHTS)
                .push("::float4[], search_vector, plainto_tsquery('english', ")
                .push_bind(search)
                .push(")) DESC");
        } else {
            let column = sort_column(query.sort.as_deref());
            let direction = if query.order_desc { "DESC" } else { "ASC" };
            builder.push(format!(" ORDER BY {column} {direction}"));
        }

        builder.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

        let rows: Vec<Value> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let records = rows.into_iter().map(deserialize_record).collect::<ScrapeResult<Vec<_>>>()?;

        let total: i64 = count_builder.build_query_scalar().fetch_one(&self.pool).await.map_err(store_err)?;

        Ok((records, total))
    }

    pub async fn stats_overview(&self) -> ScrapeResult<ContentStatsOverview> {
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM content_records")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        let by_type_rows = sqlx::query("SELECT category, count(*) AS n FROM content_records GROUP BY category")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        let by_type = by_type_rows
            .into_iter()
            .map(|row: PgRow| (row.get::<String, _>("category"), row.get::<i64, _>("n")))
            .collect();

        let top_source_rows = sqlx::query(
            "SELECT source_host, count(*) AS n FROM content_records GROUP BY source_host ORDER BY n DESC LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        let top_sources = top_source_rows
            .into_iter()
            .map(|row: PgRow| (row.get::<String, _>("source_host"), row.get::<i64, _>("n")))
            .collect();

        Ok(ContentStatsOverview { total, by_type, top_sources })
    }
}

fn push_filters(builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>, query: &ContentListQuery) {
    if let Some(category) = query.category {
        builder.push(" AND category = ").push_bind(category_str(category));
    }
    if let Some(source_host) = &query.source_host {
        builder.push(" AND source_host = ").push_bind(source_host.clone());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status_str(status));
    }
    if let Some(min_relevance) = query.min_relevance {
        builder
            .push(" AND (data->>'relevance_score')::int >= ")
            .push_bind(min_relevance as i32);
    }
    if let Some(max_age_days) = query.max_age_days {
        let cutoff = Utc::now() - ChronoDuration::days(max_age_days as i64);
        builder.push(" AND scraped_at >= ").push_bind(cutoff);
    }
    for tag in &query.tags {
        builder.push(" AND data->'tags' ? ").push_bind(tag.clone());
    }
    for keyword in &query.keywords {
        builder.push(" AND data->'keyword_hits' ? ").push_bind(keyword.clone());
    }
}

fn sort_column(sort: Option<&str>) -> &'static str {
    match sort {
        Some("title") => "data->>'title'",
        Some("relevance") | Some("relevance_score") => "(data->>'relevance_score')::int",
        Some("published_at") => "published_at",
        _ => "scraped_at",
    }
}

async fn apply_update(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, record: &ContentRecord, merged: &Value) -> ScrapeResult<()> {
    let published_at: Option<DateTime<Utc>> = merged
        .get("published_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let expires_at: Option<DateTime<Utc>> = merged
        .get("expires_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    sqlx::query(
        "UPDATE content_records
         SET data = $2, category = $3, source_host = $4, status = $5, published_at = $6, expires_at = $7
         WHERE content_hash = $1",
    )
    .bind(&record.content_hash)
    .bind(merged)
    .bind(category_str(record.category))
    .bind(&record.source_host)
    .bind(status_str(record.status))
    .bind(published_at)
    .bind(expires_at)
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;
    Ok(())
}

fn category_str(category: ContentCategory) -> &'static str {
    match category {
        ContentCategory::News => "news",
        ContentCategory::Job => "job",
        ContentCategory::Blog => "blog",
        ContentCategory::Article => "article",
        ContentCategory::Documentation => "documentation",
        ContentCategory::Tutorial => "tutorial",
        ContentCategory::Video => "video",
        ContentCategory::Other => "other",
    }
}

fn status_str(status: ContentStatus) -> &'static str {
    match status {
        ContentStatus::Active => "active",
        ContentStatus::Archived => "archived",
        ContentStatus::Deleted => "deleted",
        ContentStatus::Flagged => "flagged",
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn store_err(err: sqlx::Error) -> ScrapeError {
    ScrapeError::StoreError(err.to_string())
}

fn deserialize_record(data: Value) -> ScrapeResult<ContentRecord> {
    serde_json::from_value(data).map_err(|e| ScrapeError::Internal(format!("corrupt content record: {e}")))
}

/// Applies every field from `record` except `content_hash`, `scraped_at`,
/// and `expires_at` (both fixed at insertion time, spec.md §3) onto `old`,
/// and reports whether any substantive field actually changed.
fn merge_non_identity_fields(old: &Value, record: &ContentRecord) -> (Value, bool) {
    let mut merged = serde_json::to_value(record).expect("ContentRecord always serializes");
    let old_obj = old.as_object().cloned().unwrap_or_default();

    if let Some(obj) = merged.as_object_mut() {
        if let Some(scraped_at) = old_obj.get("scraped_at") {
            obj.insert("scraped_at".to_string(), scraped_at.clone());
        }
        if let Some(expires_at) = old_obj.get("expires_at") {
            obj.insert("expires_at".to_string(), expires_at.clone());
        }
    }

    let mut comparison_new = merged.clone();
    let mut comparison_old = Value::Object(old_obj);
    if let Some(obj) = comparison_new.as_object_mut() {
        obj.remove("updated_at");
    }
    if let Some(obj) = comparison_old.as_object_mut() {
        obj.remove("updated_at");
    }
    let changed = comparison_new != comparison_old;

    if !changed {
        if let (Some(obj), Some(old_updated)) = (merged.as_object_mut(), comparison_old.as_object().and_then(|o| o.get("updated_at"))) {
            obj.insert("updated_at".to_string(), old_updated.clone());
        }
    }

    (merged, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scrapecore_types::{Author, JobDetail};
    use std::collections::BTreeSet;

    fn sample() -> ContentRecord {
        ContentRecord {
            content_hash: ContentRecord::compute_hash("https://example.com/a", "Title"),
            category: ContentCategory::News,
            url: "https://example.com/a".to_string(),
            title: "Title".to_string(),
            description: Some("desc".to_string()),
            body: None,
            image_url: None,
            author: None::<Author>,
            published_at: None,
            source_host: "example.com".to_string(),
            source_name: "Example".to_string(),
            tags: BTreeSet::from(["news".to_string()]),
            keyword_hits: BTreeSet::from(["webmethods".to_string()]),
            relevance_score: 55,
            job_detail: None::<JobDetail>,
            scraped_by: "news-feed".to_string(),
            scraped_at: Utc::now(),
            expires_at: None,
            status: ContentStatus::Active,
            view_count: 0,
            click_count: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn identical_record_yields_no_change() {
        let record = sample();
        let old = serde_json::to_value(&record).unwrap();
        let (_merged, changed) = merge_non_identity_fields(&old, &record);
        assert!(!changed);
    }

    #[test]
    fn changed_title_is_detected_and_scraped_at_preserved() {
        let original = sample();
        let old = serde_json::to_value(&original).unwrap();
        let mut updated = original.clone();
        updated.title = "New Title".to_string();
        updated.scraped_at = Utc::now() + ChronoDuration::days(1);

        let (merged, changed) = merge_non_identity_fields(&old, &updated);
        assert!(changed);
        assert_eq!(merged["title"], "New Title");
        assert_eq!(merged["scraped_at"], old["scraped_at"]);
    }
}
