//! Shared domain types for the scraping core.
//!
//! Every other `scrapecore-*` crate depends on this one for the
//! `ContentRecord` / `RunLog` data model, the crate-wide `ScrapeError`
//! currency, and the environment-driven `AppConfig`.

mod config;
mod content;
mod errors;
mod runlog;

pub use config::{AppConfig, DomainProfile};
pub use content::{Author, ContentCategory, ContentRecord, ContentStatus, JobDetail};
pub use errors::{ScrapeError, ScrapeResult};
pub use runlog::{
    PerformanceCounters, RateLimitSummary, ResultCounters, RobotsSummary, RunConfigSnapshot,
    RunLog, RunLogError, RunLogWarning, RunStatus, TriggerSource,
};
