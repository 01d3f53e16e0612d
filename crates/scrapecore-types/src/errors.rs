use thiserror::Error;

/// Crate-wide error currency, shared by every `scrapecore-*` crate the way
/// `riptide-types::RiptideError` is shared across the teacher's workspace.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("robots.txt disallows {url}")]
    RobotsDisallowed { url: String },

    #[error("failed to fetch robots.txt for {origin}: {message}")]
    RobotsFetchError { origin: String, message: String },

    #[error("fetch timed out for {url} after {elapsed_ms}ms")]
    FetchTimeout { url: String, elapsed_ms: u64 },

    #[error("network error fetching {url}: {message}")]
    FetchNetwork { url: String, message: String },

    #[error("fetch of {url} returned status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("exhausted retries fetching {url} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("failed to parse item from {src}: {message}")]
    ParseError { src: String, message: String },

    #[error("store error: {0}")]
    StoreError(String),

    #[error("duplicate key for content hash {0}")]
    DuplicateKey(String),

    #[error("a scraping run is already in progress")]
    AlreadyRunning,

    #[error("no such adapter: {0}")]
    NotFound(String),

    #[error("run was cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

impl ScrapeError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::FetchTimeout { .. }
                | ScrapeError::FetchNetwork { .. }
                | ScrapeError::FetchStatus { .. }
        )
    }

    /// HTTP-shaped error kind, used by `scrapecore-api` to pick a status
    /// code and by `RunLog::add_error` to classify an error entry.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::RobotsDisallowed { .. } => "robots_disallowed",
            ScrapeError::RobotsFetchError { .. } => "robots_fetch_error",
            ScrapeError::FetchTimeout { .. } => "fetch_timeout",
            ScrapeError::FetchNetwork { .. } => "fetch_network",
            ScrapeError::FetchStatus { .. } => "fetch_status",
            ScrapeError::FetchExhausted { .. } => "fetch_exhausted",
            ScrapeError::ParseError { .. } => "parse_error",
            ScrapeError::StoreError(_) => "store_error",
            ScrapeError::DuplicateKey(_) => "duplicate_key",
            ScrapeError::AlreadyRunning => "already_running",
            ScrapeError::NotFound(_) => "not_found",
            ScrapeError::Cancelled => "cancelled",
            ScrapeError::Config(_) => "config_error",
            ScrapeError::Internal(_) => "internal_error",
        }
    }
}
