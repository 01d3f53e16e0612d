use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Per-host rate-limit profile: capacity, refill rate, and jitter bounds
/// (spec.md §6 "Rate-limit defaults").
#[derive(Debug, Clone, PartialEq)]
pub struct DomainProfile {
    pub capacity: f64,
    pub refill_per_sec: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl DomainProfile {
    pub const fn new(capacity: f64, refill_per_sec: f64, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            min_delay: Duration::from_millis(min_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }
}

/// Environment-driven application configuration, loaded once at startup and
/// passed by handle (spec.md §9: "make the singleton explicit").
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub search_keywords: Vec<String>,
    pub max_items_per_category: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub max_concurrent_requests: usize,
    pub scrape_delay_min: Duration,
    pub scrape_delay_max: Duration,
    pub use_puppeteer: bool,
    pub robots_user_agent: String,
    pub content_max_age_days: i64,
    pub auto_scrape_enabled: bool,
    pub scrape_cron_schedule: String,
    pub proxy: Option<ProxyConfig>,
    pub log_level: String,
    pub domain_profiles: HashMap<String, DomainProfile>,
    pub default_domain_profile: DomainProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AppConfig {
    /// Reads every variable from spec.md §6 "Configuration (environment)",
    /// falling back to the documented default when unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 3000),
            database_url: env::var("MONGODB_URI")
                .or_else(|_| env::var("DATABASE_URL"))
                .unwrap_or_else(|_| "postgres://localhost/scrapecore".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| split_csv(&v))
                .unwrap_or_default(),
            search_keywords: env::var("SEARCH_KEYWORDS")
                .map(|v| split_csv(&v))
                .unwrap_or_else(|_| vec!["webmethods".to_string()]),
            max_items_per_category: env_parse("MAX_ITEMS_PER_CATEGORY", 500),
            request_timeout: Duration::from_millis(env_parse("REQUEST_TIMEOUT", 30_000)),
            max_retries: env_parse("MAX_RETRIES", 3),
            max_concurrent_requests: env_parse("MAX_CONCURRENT_REQUESTS", 3usize),
            scrape_delay_min: Duration::from_millis(env_parse("SCRAPE_DELAY_MIN", 2_000)),
            scrape_delay_max: Duration::from_millis(env_parse("SCRAPE_DELAY_MAX", 5_000)),
            use_puppeteer: env_parse("USE_PUPPETEER", false),
            robots_user_agent: env::var("ROBOTS_USER_AGENT")
                .unwrap_or_else(|_| "ScrapeCoreBot/1.0".to_string()),
            content_max_age_days: env_parse("CONTENT_MAX_AGE_DAYS", 90),
            auto_scrape_enabled: env_parse("AUTO_SCRAPE_ENABLED", false),
            // `cron` crate schedules are seconds-first (6/7 fields); the spec's
            // five-field unix-cron default `0 */6 * * *` becomes `0 0 */6 * * *`.
            scrape_cron_schedule: env::var("SCRAPE_CRON_SCHEDULE")
                .unwrap_or_else(|_| "0 0 */6 * * *".to_string()),
            proxy: ProxyConfig::from_env(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            domain_profiles: default_domain_profiles(),
            default_domain_profile: DomainProfile::new(5.0, 0.5, 2_000, 5_000),
        }
    }

    pub fn profile_for(&self, base_domain: &str) -> DomainProfile {
        self.domain_profiles
            .get(base_domain)
            .cloned()
            .unwrap_or_else(|| self.default_domain_profile.clone())
    }
}

impl ProxyConfig {
    fn from_env() -> Option<Self> {
        let host = env::var("PROXY_HOST").ok()?;
        let port: u16 = env::var("PROXY_PORT").ok()?.parse().ok()?;
        Some(Self {
            host,
            port,
            username: env::var("PROXY_USERNAME").ok(),
            password: env::var("PROXY_PASSWORD").ok(),
        })
    }
}

/// Static rate-limit profile table keyed by exact base domain (spec.md §6).
fn default_domain_profiles() -> HashMap<String, DomainProfile> {
    let mut map = HashMap::new();
    map.insert("google.com".to_string(), DomainProfile::new(3.0, 0.3, 3_000, 8_000));
    map.insert("linkedin.com".to_string(), DomainProfile::new(2.0, 0.2, 5_000, 10_000));
    map.insert("indeed.com".to_string(), DomainProfile::new(3.0, 0.3, 3_000, 7_000));
    map.insert("twitter.com".to_string(), DomainProfile::new(2.0, 0.2, 4_000, 8_000));
    map.insert("github.com".to_string(), DomainProfile::new(5.0, 0.5, 2_000, 4_000));
    map
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_domain_falls_back_to_default_profile() {
        let config = AppConfig {
            domain_profiles: default_domain_profiles(),
            default_domain_profile: DomainProfile::new(5.0, 0.5, 2_000, 5_000),
            ..minimal()
        };
        let profile = config.profile_for("totally-unknown.example");
        assert_eq!(profile, config.default_domain_profile);
    }

    #[test]
    fn known_domain_uses_table_entry() {
        let config = AppConfig {
            domain_profiles: default_domain_profiles(),
            ..minimal()
        };
        let profile = config.profile_for("github.com");
        assert_eq!(profile.capacity, 5.0);
        assert_eq!(profile.refill_per_sec, 0.5);
    }

    fn minimal() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: String::new(),
            allowed_origins: Vec::new(),
            search_keywords: vec!["webmethods".into()],
            max_items_per_category: 500,
            request_timeout: Duration::from_millis(30_000),
            max_retries: 3,
            max_concurrent_requests: 3,
            scrape_delay_min: Duration::from_millis(2_000),
            scrape_delay_max: Duration::from_millis(5_000),
            use_puppeteer: false,
            robots_user_agent: "ScrapeCoreBot/1.0".into(),
            content_max_age_days: 90,
            auto_scrape_enabled: false,
            scrape_cron_schedule: "0 0 */6 * * *".into(),
            proxy: None,
            log_level: "info".into(),
            domain_profiles: HashMap::new(),
            default_domain_profile: DomainProfile::new(5.0, 0.5, 2_000, 5_000),
        }
    }
}
