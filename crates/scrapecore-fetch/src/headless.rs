use async_trait::async_trait;
use scrapecore_types::{ScrapeError, ScrapeResult};

/// A headless-browser fetch path, suspended at the same points as a plain
/// HTTP fetch (spec.md §4.3's "separate headless-browser fetch path").
/// Disabled by default (`USE_PUPPETEER=false`); real browser automation is
/// an optional add-on the way the teacher keeps `riptide-headless` a
/// separately built crate rather than a hard dependency of the core fetch
/// path.
#[async_trait]
pub trait HeadlessFetcher: Send + Sync {
    async fn render(&self, url: &str) -> ScrapeResult<String>;
}

pub struct DisabledHeadlessFetcher;

#[async_trait]
impl HeadlessFetcher for DisabledHeadlessFetcher {
    async fn render(&self, _url: &str) -> ScrapeResult<String> {
        Err(ScrapeError::Config(
            "headless fetching is disabled (USE_PUPPETEER=false)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_fetcher_always_errors() {
        let fetcher = DisabledHeadlessFetcher;
        assert!(fetcher.render("https://example.com").await.is_err());
    }
}
