//! Rate Limiter: per-base-domain token buckets plus a global concurrency
//! gate (spec.md §4.2).

mod bucket;
mod gate;

pub use bucket::{base_domain, DomainBucketConfig, RateLimiter, RateLimiterStats};
pub use gate::ConcurrencyGate;

pub use scrapecore_types::DomainProfile;
