use crate::{
    add_item, feed, AdapterContext, AdapterRunOutcome, RelevanceFilter, SourceAdapter,
    DEFAULT_RELEVANCE_MAX, DEFAULT_RELEVANCE_MIN,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use scrapecore_fetch::FetchOptions;
use scrapecore_types::{ContentCategory, ContentRecord, ContentStatus, JobDetail, ScrapeError, ScrapeResult};
use std::collections::BTreeSet;
use tracing::warn;

/// Job-board adapter: same feed shape as `NewsFeedAdapter`, plus
/// `role - company - location` title enrichment into `JobDetail`
/// (spec.md §4.4's "adapter-specific enrichment" example).
pub struct JobBoardAdapter {
    name: String,
    source_name: String,
    feed_urls: Vec<String>,
    relevance: RelevanceFilter,
}

impl JobBoardAdapter {
    pub fn new(name: impl Into<String>, source_name: impl Into<String>, feed_urls: Vec<String>, relevance: RelevanceFilter) -> Self {
        Self {
            name: name.into(),
            source_name: source_name.into(),
            feed_urls,
            relevance,
        }
    }
}

#[async_trait]
impl SourceAdapter for JobBoardAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_label(&self) -> &str {
        &self.source_name
    }

    fn source_origin(&self) -> &str {
        match self.feed_urls.as_slice() {
            [only] => only,
            _ => "",
        }
    }

    async fn run(&self, ctx: &AdapterContext) -> ScrapeResult<AdapterRunOutcome> {
        let mut outcome = AdapterRunOutcome::default();

        for feed_url in &self.feed_urls {
            if ctx.cancellation.is_cancelled() {
                break;
            }

            let response = match ctx
                .fetcher
                .fetch_with_retries(feed_url, FetchOptions::default(), &ctx.cancellation, |n, err| {
                    outcome.record_retry(feed_url, n, err);
                })
                .await
            {
                Ok(response) => response,
                Err(ScrapeError::RobotsDisallowed { url }) => {
                    warn!(adapter = %self.name, feed_url, "job feed fetch blocked by robots.txt, skipping");
                    outcome.record_robots_denied(&url);
                    continue;
                }
                Err(err) => {
                    warn!(adapter = %self.name, feed_url, error = %err, "job feed fetch failed, skipping");
                    outcome.record_failure(feed_url, &err);
                    continue;
                }
            };

            let entries = match feed::parse_entries(feed_url, &response.body) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(adapter = %self.name, feed_url, error = %err, "job feed parse failed, skipping");
                    outcome.record_failure(feed_url, &err);
                    continue;
                }
            };
            outcome.record_success();

            for entry in entries {
                let (Some(title), Some(link)) = (entry.title.clone(), entry.link.clone()) else {
                    continue;
                };

                let job_detail = parse_job_title(&title);
                let now = Utc::now();
                let candidate = ContentRecord {
                    content_hash: ContentRecord::compute_hash(&link, &title),
                    category: ContentCategory::Job,
                    url: link.clone(),
                    title,
                    description: entry.description,
                    body: entry.content,
                    image_url: None,
                    author: None,
                    published_at: entry.published_at,
                    source_host: feed::normalize_source_host(&link),
                    source_name: self.source_name.clone(),
                    tags: default_job_tags(),
                    keyword_hits: BTreeSet::new(),
                    relevance_score: rand::thread_rng().gen_range(DEFAULT_RELEVANCE_MIN..=DEFAULT_RELEVANCE_MAX),
                    job_detail: Some(job_detail),
                    scraped_by: self.name.clone(),
                    scraped_at: now,
                    expires_at: None,
                    status: ContentStatus::Active,
                    view_count: 0,
                    click_count: 0,
                    updated_at: now,
                };

                add_item(&mut outcome.records, candidate, &self.relevance);
            }
        }

        Ok(outcome)
    }
}

/// `{category, "webmethods", "rss"}` (spec.md §4.4, literal text) — job
/// feeds parse through the same RSS/Atom path as news feeds.
fn default_job_tags() -> BTreeSet<String> {
    BTreeSet::from(["job".to_string(), "webmethods".to_string(), "rss".to_string()])
}

/// Splits a `role - company - location` shaped title. Missing segments
/// leave the corresponding field `None` rather than guessing.
fn parse_job_title(title: &str) -> JobDetail {
    let parts: Vec<&str> = title.split(" - ").map(str::trim).collect();
    match parts.as_slice() {
        [_role, company, location] => JobDetail {
            company: Some(company.to_string()),
            location: Some(location.to_string()),
            salary_range: None,
            remote: Some(location.to_lowercase().contains("remote")),
            employment_type: None,
        },
        [_role, company] => JobDetail {
            company: Some(company.to_string()),
            location: None,
            salary_range: None,
            remote: None,
            employment_type: None,
        },
        _ => JobDetail::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_company_location() {
        let detail = parse_job_title("Senior Engineer - Acme Corp - Remote");
        assert_eq!(detail.company.as_deref(), Some("Acme Corp"));
        assert_eq!(detail.location.as_deref(), Some("Remote"));
        assert_eq!(detail.remote, Some(true));
    }

    #[test]
    fn title_without_location_leaves_it_none() {
        let detail = parse_job_title("Senior Engineer - Acme Corp");
        assert_eq!(detail.company.as_deref(), Some("Acme Corp"));
        assert_eq!(detail.location, None);
    }

    #[test]
    fn unstructured_title_yields_empty_detail() {
        let detail = parse_job_title("Just a plain title");
        assert_eq!(detail, JobDetail::default());
    }
}
