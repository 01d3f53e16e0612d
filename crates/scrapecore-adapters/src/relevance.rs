use scrapecore_types::ContentRecord;
use std::collections::BTreeSet;

/// Keyword-substring relevance gate applied by every adapter's `addItem`
/// step (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(vec!["webmethods".to_string()])
    }
}

impl RelevanceFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Composes the candidate's corpus (title + description + tags +
    /// keyword hits + source labels), lower-cased, and returns every
    /// configured keyword found as a substring.
    ///
    /// The corpus intentionally includes fields the adapter itself just
    /// set (`tags`, `keyword_hits`), per spec.md §4.4's literal text — a
    /// candidate whose adapter always tags itself with an active keyword
    /// will always pass this filter.
    pub fn matches(&self, record: &ContentRecord) -> BTreeSet<String> {
        let mut corpus = record.title.to_lowercase();
        corpus.push(' ');
        if let Some(description) = &record.description {
            corpus.push_str(&description.to_lowercase());
            corpus.push(' ');
        }
        for tag in &record.tags {
            corpus.push_str(&tag.to_lowercase());
            corpus.push(' ');
        }
        for hit in &record.keyword_hits {
            corpus.push_str(&hit.to_lowercase());
            corpus.push(' ');
        }
        corpus.push_str(&record.source_name.to_lowercase());
        corpus.push(' ');
        corpus.push_str(&record.source_host.to_lowercase());

        self.keywords
            .iter()
            .filter(|kw| corpus.contains(kw.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scrapecore_types::{ContentCategory, ContentStatus};

    fn record(title: &str, description: &str) -> ContentRecord {
        ContentRecord {
            content_hash: ContentRecord::compute_hash("https://example.com", title),
            category: ContentCategory::News,
            url: "https://example.com".to_string(),
            title: title.to_string(),
            description: Some(description.to_string()),
            body: None,
            image_url: None,
            author: None,
            published_at: None,
            source_host: "example.com".to_string(),
            source_name: "Example Feed".to_string(),
            tags: BTreeSet::new(),
            keyword_hits: BTreeSet::new(),
            relevance_score: 50,
            job_detail: None,
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
    fn matches_returns_hit_keywords() {
        let filter = RelevanceFilter::new(vec!["webmethods".to_string(), "rust".to_string()]);
        let hits = filter.matches(&record("A webMethods upgrade guide", "nothing else"));
        assert_eq!(hits.len(), 1);
        assert!(hits.contains("webmethods"));
    }

    #[test]
    fn no_match_returns_empty_set() {
        let filter = RelevanceFilter::default();
        let hits = filter.matches(&record("Completely unrelated", "still unrelated"));
        assert!(hits.is_empty());
    }
}
