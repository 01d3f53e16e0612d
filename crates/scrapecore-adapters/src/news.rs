use crate::{
    add_item, feed, AdapterContext, AdapterRunOutcome, RelevanceFilter, SourceAdapter,
    DEFAULT_RELEVANCE_MAX, DEFAULT_RELEVANCE_MIN,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use scrapecore_fetch::FetchOptions;
use scrapecore_types::{Author, ContentCategory, ContentRecord, ContentStatus, ScrapeError, ScrapeResult};
use std::collections::BTreeSet;
use tracing::warn;

/// Generic RSS/Atom adapter: news, blog, and article feeds all reduce to
/// the same `{title, link, pubDate, description}` shape (spec.md §4.4).
pub struct NewsFeedAdapter {
    name: String,
    source_name: String,
    category: ContentCategory,
    feed_urls: Vec<String>,
    relevance: RelevanceFilter,
}

impl NewsFeedAdapter {
    pub fn new(name: impl Into<String>, source_name: impl Into<String>, feed_urls: Vec<String>, relevance: RelevanceFilter) -> Self {
        Self {
            name: name.into(),
            source_name: source_name.into(),
            category: ContentCategory::News,
            feed_urls,
            relevance,
        }
    }

    pub fn with_category(mut self, category: ContentCategory) -> Self {
        self.category = category;
        self
    }
}

#[async_trait]
impl SourceAdapter for NewsFeedAdapter {
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
                    warn!(adapter = %self.name, feed_url, "feed fetch blocked by robots.txt, skipping");
                    outcome.record_robots_denied(&url);
                    continue;
                }
                Err(err) => {
                    warn!(adapter = %self.name, feed_url, error = %err, "feed fetch failed, skipping");
                    outcome.record_failure(feed_url, &err);
                    continue;
                }
            };

            let entries = match feed::parse_entries(feed_url, &response.body) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(adapter = %self.name, feed_url, error = %err, "feed parse failed, skipping");
                    outcome.record_failure(feed_url, &err);
                    continue;
                }
            };
            outcome.record_success();

            for entry in entries {
                let (Some(title), Some(link)) = (entry.title.clone(), entry.link.clone()) else {
                    continue;
                };

                let now = Utc::now();
                let candidate = ContentRecord {
                    content_hash: ContentRecord::compute_hash(&link, &title),
                    category: self.category,
                    url: link.clone(),
                    title,
                    description: entry.description,
                    body: entry.content,
                    image_url: None,
                    author: entry.author.map(|name| Author { name, url: None }),
                    published_at: entry.published_at,
                    source_host: feed::normalize_source_host(&link),
                    source_name: self.source_name.clone(),
                    tags: default_tags(self.category),
                    keyword_hits: BTreeSet::new(),
                    relevance_score: default_relevance_score(),
                    job_detail: None,
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

/// `{category, "webmethods", "rss"}` (spec.md §4.4, literal text).
fn default_tags(category: ContentCategory) -> BTreeSet<String> {
    let category_tag = serde_json::to_value(category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "news".to_string());
    BTreeSet::from([category_tag, "webmethods".to_string(), "rss".to_string()])
}

fn default_relevance_score() -> u8 {
    rand::thread_rng().gen_range(DEFAULT_RELEVANCE_MIN..=DEFAULT_RELEVANCE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tags_include_category_and_webmethods() {
        let tags = default_tags(ContentCategory::News);
        assert!(tags.contains("news"));
        assert!(tags.contains("webmethods"));
        assert!(tags.contains("rss"));
    }

    #[test]
    fn default_relevance_score_is_in_range() {
        for _ in 0..50 {
            let score = default_relevance_score();
            assert!((DEFAULT_RELEVANCE_MIN..=DEFAULT_RELEVANCE_MAX).contains(&score));
        }
    }
}
