use chrono::{DateTime, Utc};
use scrapecore_types::{ScrapeError, ScrapeResult};

/// One `<item>`/`<entry>` reduced to the fields spec.md §4.4 normalizes
/// from (`{title, link, pubDate, description, optional author, optional
/// encoded content}`).
#[derive(Debug, Clone)]
pub struct NormalizedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
}

/// Parses an RSS 2.0 / Atom / RDF payload via `feed-rs` and reduces every
/// entry to `NormalizedEntry`.
pub fn parse_entries(source: &str, body: &str) -> ScrapeResult<Vec<NormalizedEntry>> {
    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| ScrapeError::ParseError {
        src: source.to_string(),
        message: e.to_string(),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| NormalizedEntry {
            title: entry.title.map(|t| t.content),
            link: entry.links.first().map(|l| l.href.clone()),
            published_at: entry.published.or(entry.updated),
            description: entry.summary.map(|t| t.content),
            author: entry.authors.first().map(|p| p.name.clone()),
            content: entry.content.and_then(|c| c.body),
        })
        .collect())
}

/// Lower-cases the host and strips a leading `www.` (spec.md §4.4).
pub fn normalize_source_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Example Feed</title>
<item>
  <title>First Post</title>
  <link>https://example.com/first</link>
  <description>About webmethods integration</description>
  <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
</item>
</channel></rss>"#;

    #[test]
    fn parses_rss_items() {
        let entries = parse_entries("https://example.com/feed.xml", SAMPLE_RSS).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("First Post"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/first"));
    }

    #[test]
    fn invalid_payload_is_a_parse_error() {
        let result = parse_entries("https://example.com/feed.xml", "not xml");
        assert!(result.is_err());
    }

    #[test]
    fn host_is_lowercased_and_www_stripped() {
        assert_eq!(normalize_source_host("https://WWW.Example.COM/a"), "example.com");
        assert_eq!(normalize_source_host("https://blog.example.com/a"), "blog.example.com");
    }
}
