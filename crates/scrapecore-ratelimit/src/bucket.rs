use dashmap::DashMap;
use rand::Rng;
use scrapecore_types::DomainProfile;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub type DomainBucketConfig = DomainProfile;

/// Token-bucket state for one base domain (spec.md §3 "DomainBucket").
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    config: DomainBucketConfig,
}

impl Bucket {
    fn new(config: DomainBucketConfig) -> Self {
        Self {
            tokens: config.capacity,
            last_refill: Instant::now(),
            config,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
        self.last_refill = now;
    }

    /// Seconds to wait until at least one token is available.
    fn wait_for_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let deficit = 1.0 - self.tokens;
        Duration::from_secs_f64(deficit / self.config.refill_per_sec)
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub throttled_requests: u64,
    pub total_wait_ms: u64,
}

impl RateLimiterStats {
    pub fn avg_wait_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_wait_ms as f64 / self.total_requests as f64
        }
    }
}

/// Per-base-domain token buckets, a static profile table, and aggregate
/// telemetry. `acquire` may sleep; callers should hold no other lock across
/// the call (spec.md §5).
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Mutex<Bucket>>>,
    profiles: DashMap<String, DomainBucketConfig>,
    default_profile: DomainBucketConfig,
    total_requests: AtomicU64,
    throttled_requests: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    pub fn new(
        profiles: impl IntoIterator<Item = (String, DomainBucketConfig)>,
        default_profile: DomainBucketConfig,
    ) -> Self {
        let table = DashMap::new();
        for (domain, profile) in profiles {
            table.insert(domain, profile);
        }
        Self {
            buckets: DashMap::new(),
            profiles: table,
            default_profile,
            total_requests: AtomicU64::new(0),
            throttled_requests: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Reconfigures the static profile for `domain`. The existing bucket is
    /// dropped so the next `acquire` creates a fresh one at the new
    /// capacity (spec.md §4.2).
    pub fn configure_domain(&self, domain: &str, config: DomainBucketConfig) {
        self.profiles.insert(domain.to_string(), config);
        self.buckets.remove(domain);
    }

    /// Acquires a permit for `url`'s base domain: waits for a token, then
    /// sleeps a uniformly random extra delay in `[min_delay, max_delay]`
    /// (spec.md §4.2 item 1).
    pub async fn acquire(&self, url: &str) {
        let domain = base_domain(url);
        let bucket_arc = self.bucket_for(&domain);

        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let (wait, min_delay, max_delay) = {
            let mut bucket = bucket_arc.lock().await;
            bucket.refill();
            let wait = bucket.wait_for_token();
            if wait > Duration::ZERO {
                self.throttled_requests.fetch_add(1, Ordering::Relaxed);
            }
            (wait, bucket.config.min_delay, bucket.config.max_delay)
        };

        if wait > Duration::ZERO {
            debug!(domain = %domain, wait_ms = wait.as_millis(), "rate limiter: waiting for token");
            tokio::time::sleep(wait).await;
        }

        {
            let mut bucket = bucket_arc.lock().await;
            bucket.refill();
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
        }

        let jitter = jittered_delay(min_delay, max_delay);
        self.total_wait_ms
            .fetch_add((wait + jitter).as_millis() as u64, Ordering::Relaxed);
        if jitter > Duration::ZERO {
            tokio::time::sleep(jitter).await;
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            throttled_requests: self.throttled_requests.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.throttled_requests.store(0, Ordering::Relaxed);
        self.total_wait_ms.store(0, Ordering::Relaxed);
    }

    fn bucket_for(&self, domain: &str) -> Arc<Mutex<Bucket>> {
        if let Some(existing) = self.buckets.get(domain) {
            return existing.clone();
        }
        let config = self
            .profiles
            .get(domain)
            .map(|p| p.clone())
            .unwrap_or_else(|| self.default_profile.clone());
        let bucket = Arc::new(Mutex::new(Bucket::new(config)));
        self.buckets.insert(domain.to_string(), bucket.clone());
        bucket
    }
}

/// `minDelay == maxDelay` yields exactly that value (spec.md §8 boundary
/// behavior); otherwise a uniform draw in `[min, max]`.
fn jittered_delay(min_delay: Duration, max_delay: Duration) -> Duration {
    if min_delay >= max_delay {
        return min_delay;
    }
    let mut rng = rand::thread_rng();
    let min_ms = min_delay.as_millis() as u64;
    let max_ms = max_delay.as_millis() as u64;
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}

/// Last two labels of the host (`news.example.com` → `example.com`).
/// Single-label or unparseable hosts get a synthetic key so they still get
/// their own bucket instead of colliding with the default profile's domain.
pub fn base_domain(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string());

    let labels: Vec<&str> = host.split('.').filter(|s| !s.is_empty()).collect();
    match labels.len() {
        0 => format!("unknown:{host}"),
        1 => format!("single-label:{}", labels[0]),
        n => format!("{}.{}", labels[n - 2], labels[n - 1]),
    }
}
