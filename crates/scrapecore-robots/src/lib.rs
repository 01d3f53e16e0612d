//! Robots Cache: fetch-once, TTL-cached per-origin robots.txt rules
//! (spec.md §4.1).

mod parser;

pub use parser::RobotsRuleSet;

use dashmap::DashMap;
use scrapecore_types::{ScrapeError, ScrapeResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct RobotsConfig {
    pub ttl: Duration,
    pub max_size: usize,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_size: 100,
            fetch_timeout: Duration::from_secs(10),
            user_agent: "ScrapeCoreBot/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RobotsEntry {
    pub origin: String,
    pub fetched_at: Instant,
    pub exists: bool,
    pub rules: Option<RobotsRuleSet>,
    pub raw: String,
}

impl RobotsEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsCacheStats {
    pub fetch_errors: u64,
    pub cached_origins: usize,
}

/// Per-origin `<origin>/robots.txt` cache. A miss on the same origin from
/// many concurrent callers coalesces into a single network fetch
/// (single-flight), per spec.md §5.
pub struct RobotsCache {
    config: RobotsConfig,
    client: reqwest::Client,
    entries: DashMap<String, Arc<OnceCell<RobotsEntry>>>,
    insertion_order: Mutex<VecDeque<String>>,
    fetch_errors: AtomicU64,
}

impl RobotsCache {
    pub fn new(config: RobotsConfig) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| ScrapeError::Internal(format!("failed to build robots client: {e}")))?;
        Ok(Self {
            config,
            client,
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            fetch_errors: AtomicU64::new(0),
        })
    }

    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> ScrapeResult<bool> {
        let parsed = Url::parse(url)
            .map_err(|e| ScrapeError::Internal(format!("invalid url {url}: {e}")))?;
        let origin = origin_key(&parsed);
        let entry = self.get_or_fetch(&origin).await?;

        match &entry.rules {
            Some(rules) => Ok(rules.is_allowed(user_agent, parsed.path())),
            None => Ok(true), // no robots.txt at this origin: allow all
        }
    }

    pub async fn crawl_delay(&self, url: &str, user_agent: &str) -> ScrapeResult<Option<Duration>> {
        let parsed = Url::parse(url)
            .map_err(|e| ScrapeError::Internal(format!("invalid url {url}: {e}")))?;
        let origin = origin_key(&parsed);
        let entry = self.get_or_fetch(&origin).await?;
        Ok(entry
            .rules
            .as_ref()
            .and_then(|r| r.crawl_delay(user_agent))
            .map(Duration::from_secs_f64))
    }

    pub async fn sitemaps(&self, url: &str) -> ScrapeResult<Vec<String>> {
        let parsed = Url::parse(url)
            .map_err(|e| ScrapeError::Internal(format!("invalid url {url}: {e}")))?;
        let origin = origin_key(&parsed);
        let entry = self.get_or_fetch(&origin).await?;
        Ok(entry
            .rules
            .as_ref()
            .map(|r| r.sitemaps.clone())
            .unwrap_or_default())
    }

    pub fn stats(&self) -> RobotsCacheStats {
        RobotsCacheStats {
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            cached_origins: self.entries.len(),
        }
    }

    async fn get_or_fetch(&self, origin: &str) -> ScrapeResult<RobotsEntry> {
        if let Some(slot) = self.entries.get(origin) {
            if let Some(entry) = slot.get() {
                if !entry.is_expired(self.config.ttl) {
                    return Ok(entry.clone());
                }
            }
        }

        // TTL miss or absent: (re)create the single-flight slot for this
        // origin. A fresh OnceCell replaces any expired one so concurrent
        // callers that arrive during the refetch still coalesce.
        let slot = self.insert_fresh_slot(origin).await;
        let entry = slot
            .get_or_try_init(|| self.fetch(origin))
            .await?
            .clone();
        Ok(entry)
    }

    async fn insert_fresh_slot(&self, origin: &str) -> Arc<OnceCell<RobotsEntry>> {
        if let Some(existing) = self.entries.get(origin) {
            let stale = match existing.get() {
                Some(entry) => entry.is_expired(self.config.ttl),
                None => false, // another caller's fetch is already in flight
            };
            if !stale {
                return existing.clone();
            }
        }

        let fresh = Arc::new(OnceCell::new());
        self.entries.insert(origin.to_string(), fresh.clone());
        self.record_insertion(origin).await;
        fresh
    }

    async fn record_insertion(&self, origin: &str) {
        let mut order = self.insertion_order.lock().await;
        order.push_back(origin.to_string());
        while order.len() > self.config.max_size {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    async fn fetch(&self, origin: &str) -> ScrapeResult<RobotsEntry> {
        let robots_url = format!("{origin}/robots.txt");
        debug!(origin, robots_url, "fetching robots.txt");

        let result = self.client.get(&robots_url).send().await;
        match result {
            Ok(response) if (response.status().as_u16()) < 500 => {
                if response.status().is_success() {
                    let raw = response.text().await.unwrap_or_default();
                    let rules = RobotsRuleSet::parse(&raw);
                    Ok(RobotsEntry {
                        origin: origin.to_string(),
                        fetched_at: Instant::now(),
                        exists: true,
                        rules: Some(rules),
                        raw,
                    })
                } else {
                    // Any non-5xx, non-2xx response: no robots.txt, allow all.
                    Ok(RobotsEntry {
                        origin: origin.to_string(),
                        fetched_at: Instant::now(),
                        exists: false,
                        rules: None,
                        raw: String::new(),
                    })
                }
            }
            Ok(response) => {
                // 5xx: treat as a fetch error, but still permissive.
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(origin, status = %response.status(), "robots.txt fetch returned server error, allowing all");
                Ok(permissive_entry(origin))
            }
            Err(err) => {
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                warn!(origin, error = %err, "robots.txt fetch failed, allowing all");
                Ok(permissive_entry(origin))
            }
        }
    }
}

fn permissive_entry(origin: &str) -> RobotsEntry {
    RobotsEntry {
        origin: origin.to_string(),
        fetched_at: Instant::now(),
        exists: false,
        rules: None,
        raw: String::new(),
    }
}

fn origin_key(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), url.host_str().unwrap_or(""), port),
        None => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache() -> RobotsCache {
        RobotsCache::new(RobotsConfig {
            ttl: Duration::from_secs(60),
            max_size: 2,
            fetch_timeout: Duration::from_secs(2),
            user_agent: "ScrapeCoreBot/1.0".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn disallowed_origin_blocks_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
            .mount(&server)
            .await;

        let cache = cache();
        let url = format!("{}/private", server.uri());
        assert!(!cache.is_allowed(&url, "ScrapeCoreBot").await.unwrap());
    }

    #[tokio::test]
    async fn missing_robots_txt_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = cache();
        let url = format!("{}/anything", server.uri());
        assert!(cache.is_allowed(&url, "ScrapeCoreBot").await.unwrap());
    }

    #[tokio::test]
    async fn server_error_is_permissive_and_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cache = cache();
        let url = format!("{}/anything", server.uri());
        assert!(cache.is_allowed(&url, "ScrapeCoreBot").await.unwrap());
        assert_eq!(cache.stats().fetch_errors, 1);
    }

    #[tokio::test]
    async fn concurrent_misses_single_flight_to_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(cache());
        let url = format!("{}/page", server.uri());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                cache.is_allowed(&url, "ScrapeCoreBot").await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn cache_evicts_oldest_at_capacity() {
        let cache = cache(); // max_size = 2
        let server_a = MockServer::start().await;
        let server_b = MockServer::start().await;
        let server_c = MockServer::start().await;
        for server in [&server_a, &server_b, &server_c] {
            Mock::given(method("GET"))
                .and(path("/robots.txt"))
                .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
                .mount(server)
                .await;
        }

        cache.is_allowed(&format!("{}/x", server_a.uri()), "bot").await.unwrap();
        cache.is_allowed(&format!("{}/x", server_b.uri()), "bot").await.unwrap();
        cache.is_allowed(&format!("{}/x", server_c.uri()), "bot").await.unwrap();

        assert_eq!(cache.stats().cached_origins, 2);
    }
}
