//! Fetcher: robots check, concurrency gate, rate limit, UA rotation, and
//! retry/backoff wrapped around one HTTP request (spec.md §4.3).

mod headers;
mod headless;
mod user_agent;

pub use headers::browser_headers;
pub use headless::{DisabledHeadlessFetcher, HeadlessFetcher};
pub use user_agent::{RequestClass, UserAgentPool};

use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::Method;
use scrapecore_ratelimit::{ConcurrencyGate, RateLimiter};
use scrapecore_robots::RobotsCache;
use scrapecore_types::{ScrapeError, ScrapeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: usize = 3;
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 30_000;
const BACKOFF_JITTER_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub max_retries: Option<usize>,
    pub request_class: RequestClass,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            max_retries: None,
            request_class: RequestClass::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
}

pub struct Fetcher {
    robots: Arc<RobotsCache>,
    gate: Arc<ConcurrencyGate>,
    limiter: Arc<RateLimiter>,
    ua_pool: UserAgentPool,
    client: reqwest::Client,
    robots_user_agent: String,
    default_timeout: Duration,
    default_max_retries: usize,
}

impl Fetcher {
    pub fn new(
        robots: Arc<RobotsCache>,
        gate: Arc<ConcurrencyGate>,
        limiter: Arc<RateLimiter>,
        robots_user_agent: String,
    ) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ScrapeError::Internal(format!("failed to build fetch client: {e}")))?;
        Ok(Self {
            robots,
            gate,
            limiter,
            ua_pool: UserAgentPool::default(),
            client,
            robots_user_agent,
            default_timeout: DEFAULT_TIMEOUT,
            default_max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_user_agent_pool(mut self, pool: UserAgentPool) -> Self {
        self.ua_pool = pool;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Executes one logical fetch against `url` (spec.md §4.3). Robots
    /// denial fails immediately without consuming a retry; other failures
    /// retry with exponential backoff up to `options.max_retries`.
    ///
    /// Intermediate attempt failures are discarded — callers that need to
    /// record each failed attempt (spec.md §8 scenario 4) should use
    /// [`Fetcher::fetch_with_retries`] instead.
    pub async fn fetch(
        &self,
        url: &str,
        options: FetchOptions,
        cancellation: &CancellationToken,
    ) -> ScrapeResult<FetchResponse> {
        self.fetch_with_retries(url, options, cancellation, |_, _| {}).await
    }

    /// Same as [`Fetcher::fetch`], but invokes `on_retry(retry_count, &err)`
    /// once per failed attempt that gets retried, before the backoff sleep.
    /// `retry_count` starts at 1. The attempt that exhausts `max_retries` is
    /// not passed to `on_retry` — it surfaces directly as the returned
    /// `ScrapeError::FetchExhausted`.
    pub async fn fetch_with_retries(
        &self,
        url: &str,
        options: FetchOptions,
        cancellation: &CancellationToken,
        mut on_retry: impl FnMut(u32, &ScrapeError),
    ) -> ScrapeResult<FetchResponse> {
        if !self.robots.is_allowed(url, &self.robots_user_agent).await? {
            warn!(url, "robots.txt disallows this URL");
            return Err(ScrapeError::RobotsDisallowed { url: url.to_string() });
        }

        let max_retries = options.max_retries.unwrap_or(self.default_max_retries);
        let mut attempt = 0usize;

        loop {
            if cancellation.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let attempt_result = self.attempt_once(url, &options).await;

            match attempt_result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(ScrapeError::FetchExhausted {
                            url: url.to_string(),
                            attempts: attempt as u32,
                            last_error: err.to_string(),
                        });
                    }
                    on_retry(attempt as u32, &err);
                    let backoff = backoff_duration(attempt);
                    debug!(url, attempt, backoff_ms = backoff.as_millis(), "fetch attempt failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancellation.cancelled() => return Err(ScrapeError::Cancelled),
                    }
                }
            }
        }
    }

    async fn attempt_once(&self, url: &str, options: &FetchOptions) -> ScrapeResult<FetchResponse> {
        let _permit = self.gate.acquire().await;
        self.limiter.acquire(url).await;

        let user_agent = self.ua_pool.pick(options.request_class).to_string();
        let mut headers = browser_headers(&user_agent);
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .timeout(self.default_timeout)
            .header(reqwest::header::USER_AGENT, &user_agent);
        request = apply_headers(request, &headers);
        if let Some(body) = options.body.clone() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::FetchTimeout {
                    url: url.to_string(),
                    elapsed_ms: self.default_timeout.as_millis() as u64,
                }
            } else {
                ScrapeError::FetchNetwork {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        if (200..400).contains(&status) {
            let body = response.text().await.map_err(|e| ScrapeError::FetchNetwork {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(FetchResponse {
                status,
                body,
                headers: response_headers,
            })
        } else {
            Err(ScrapeError::FetchStatus {
                url: url.to_string(),
                status,
            })
        }
    }
}

fn apply_headers(mut request: reqwest::RequestBuilder, headers: &HeaderMap) -> reqwest::RequestBuilder {
    for (name, value) in headers.iter() {
        request = request.header(name.clone(), value.clone());
    }
    request
}

/// `min(cap, 2^attempt * base + jitter[0..500ms])` (spec.md §4.3 step 6).
fn backoff_duration(attempt: usize) -> Duration {
    let exp = 2u64.saturating_pow(attempt as u32).saturating_mul(BACKOFF_BASE_MS);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(exp.saturating_add(jitter).min(BACKOFF_CAP_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapecore_ratelimit::DomainBucketConfig;
    use scrapecore_robots::RobotsConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        let robots = Arc::new(RobotsCache::new(RobotsConfig::default()).unwrap());
        let gate = Arc::new(ConcurrencyGate::new(3));
        let limiter = Arc::new(RateLimiter::new(
            std::iter::empty(),
            DomainBucketConfig::new(100.0, 1000.0, 0, 0),
        ));
        Fetcher::new(robots, gate, limiter, "ScrapeCoreBot/1.0".to_string()).unwrap()
    }

    #[tokio::test]
    async fn successful_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let response = fetcher
            .fetch(&format!("{}/page", server.uri()), FetchOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "hello");
    }

    #[tokio::test]
    async fn robots_disallow_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let result = fetcher
            .fetch(&format!("{}/private", server.uri()), FetchOptions::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScrapeError::RobotsDisallowed { .. })));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let response = fetcher
            .fetch(&format!("{}/flaky", server.uri()), FetchOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.body, "ok");
    }

    #[tokio::test]
    async fn fetch_with_retries_reports_each_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky2"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let mut options = FetchOptions::default();
        options.max_retries = Some(5);
        let mut retries = Vec::new();
        let response = fetcher
            .fetch_with_retries(&format!("{}/flaky2", server.uri()), options, &CancellationToken::new(), |n, _err| {
                retries.push(n);
            })
            .await
            .unwrap();
        assert_eq!(response.body, "ok");
        assert_eq!(retries, vec![1, 2]);
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let mut options = FetchOptions::default();
        options.max_retries = Some(2);
        let result = fetcher
            .fetch(&format!("{}/broken", server.uri()), options, &CancellationToken::new())
            .await;
        match result {
            Err(ScrapeError::FetchExhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected FetchExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_retry_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let token = CancellationToken::new();
        token.cancel();
        let result = fetcher
            .fetch(&format!("{}/broken", server.uri()), FetchOptions::default(), &token)
            .await;
        assert!(matches!(result, Err(ScrapeError::Cancelled)));
    }

    #[test]
    fn backoff_grows_exponentially_and_is_capped() {
        assert!(backoff_duration(1).as_millis() >= 1000);
        assert!(backoff_duration(10).as_millis() as u64 <= BACKOFF_CAP_MS);
    }
}
