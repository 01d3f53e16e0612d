use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// One of the closed set of content categories spec.md §3 enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    News,
    Job,
    Blog,
    Article,
    Documentation,
    Tutorial,
    Video,
    Other,
}

/// Operator-facing lifecycle status for a `ContentRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Active,
    Archived,
    Deleted,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub url: Option<String>,
}

/// Job-category enrichment, populated by adapters that recognize a
/// `role - company - location` shaped title (spec.md §4.4).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub remote: Option<bool>,
    pub employment_type: Option<String>,
}

/// A single scraped item, identity derived from `content_hash`.
///
/// `content_hash = SHA-256(lc(trim(url)) || "|" || lc(trim(title)))`,
/// hex-encoded (spec.md §3, invariant 1 of §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_hash: String,
    pub category: ContentCategory,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub author: Option<Author>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_host: String,
    pub source_name: String,
    pub tags: BTreeSet<String>,
    pub keyword_hits: BTreeSet<String>,
    pub relevance_score: u8,
    pub job_detail: Option<JobDetail>,
    pub scraped_by: String,
    pub scraped_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ContentStatus,
    pub view_count: u64,
    pub click_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub const MAX_TITLE_LEN: usize = 500;
    pub const MAX_DESCRIPTION_LEN: usize = 5000;

    /// `SHA-256(lc(trim(url)) || "|" || lc(trim(title)))`, hex-encoded.
    ///
    /// Only the scheme and host are case-folded (hosts are case-insensitive
    /// by spec, paths are not): stable under whitespace and host-case
    /// variation, but two URLs differing only in path case still yield
    /// distinct hashes.
    pub fn compute_hash(url: &str, title: &str) -> String {
        let normalized_url = normalize_url_case(url.trim());
        let normalized = format!("{}|{}", normalized_url, title.trim().to_lowercase());
        let digest = Sha256::digest(normalized.as_bytes());
        hex::encode(digest)
    }

    /// Whether this record is exempt from TTL and age-based cleanup
    /// (spec.md §3 invariant: flagged records never expire).
    pub fn is_cleanup_exempt(&self) -> bool {
        self.status == ContentStatus::Flagged
    }
}

/// Lower-cases the scheme and host of `raw`, leaving path/query/fragment
/// case untouched. Falls back to a full lowercase if `raw` doesn't parse as
/// an absolute URL (rare for scraped items, which always carry one).
fn normalize_url_case(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            let host_lower = parsed.host_str().map(|h| h.to_lowercase());
            if let Some(host) = host_lower {
                let _ = parsed.set_host(Some(&host));
            }
            let scheme_lower = parsed.scheme().to_lowercase();
            let _ = parsed.set_scheme(&scheme_lower);
            parsed.to_string()
        }
        Err(_) => raw.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_under_whitespace_and_host_case() {
        let a = ContentRecord::compute_hash(" https://Example.com/a ", " Title ");
        let b = ContentRecord::compute_hash("https://example.com/a", "title");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_differs_on_path_case() {
        let a = ContentRecord::compute_hash("https://example.com/A", "title");
        let b = ContentRecord::compute_hash("https://example.com/a", "title");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let h = ContentRecord::compute_hash("https://example.com", "t");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
