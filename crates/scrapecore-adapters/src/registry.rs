//! The fixed adapter set (spec.md §4.4: adapters hold a static list of feed
//! endpoints). Shared by `scrapecore-api` and `scrapecore-cli` so both
//! binaries wire up the same `Scraper` regardless of which process runs it.

use crate::{JobBoardAdapter, NewsFeedAdapter, RelevanceFilter, SourceAdapter};
use scrapecore_types::AppConfig;
use std::sync::Arc;

pub fn default_adapters(config: &AppConfig) -> Vec<Arc<dyn SourceAdapter>> {
    let relevance = RelevanceFilter::new(config.search_keywords.clone());

    let news = NewsFeedAdapter::new(
        "news",
        "Vendor & Community News",
        vec![
            "https://news.ycombinator.com/rss".to_string(),
            "https://www.softwareag.com/en_corporate/resources/news/rss.xml".to_string(),
        ],
        relevance.clone(),
    );
    let jobs = JobBoardAdapter::new(
        "jobs",
        "Aggregated Job Boards",
        vec!["https://weworkremotely.com/categories/remote-programming-jobs.rss".to_string()],
        relevance,
    );
    vec![Arc::new(news), Arc::new(jobs)]
}
