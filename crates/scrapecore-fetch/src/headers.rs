use reqwest::header::{HeaderMap, HeaderValue};

/// Builds the browser-shaped header set for a given user-agent string
/// (spec.md §4.3 step 4), grounded on the teacher's
/// `riptide-stealth::enhancements::header_consistency` heuristics.
pub fn browser_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let is_edge = user_agent.contains("Edg");
    let is_chrome = user_agent.contains("Chrome") && !is_edge;

    insert(&mut headers, "accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8");
    insert(&mut headers, "accept-language", "en-US,en;q=0.9");
    insert(&mut headers, "accept-encoding", "gzip, deflate, br");
    insert(&mut headers, "connection", "keep-alive");
    insert(&mut headers, "upgrade-insecure-requests", "1");

    if is_chrome || is_edge {
        if let Some(version) = extract_version(user_agent, "Chrome/") {
            let major = version.split('.').next().unwrap_or("124");
            let brand = if is_edge { "Microsoft Edge" } else { "Google Chrome" };
            insert(
                &mut headers,
                "sec-ch-ua",
                &format!(r#""{brand}";v="{major}", "Chromium";v="{major}", "Not=A?Brand";v="99""#),
            );
            let mobile = if user_agent.contains("Mobile") { "?1" } else { "?0" };
            insert(&mut headers, "sec-ch-ua-mobile", mobile);
            let platform = if user_agent.contains("Windows") {
                "Windows"
            } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
                "macOS"
            } else if user_agent.contains("Android") {
                "Android"
            } else if user_agent.contains("Linux") {
                "Linux"
            } else {
                "Unknown"
            };
            insert(&mut headers, "sec-ch-ua-platform", &format!(r#""{platform}""#));
        }
    }

    headers
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

fn extract_version(user_agent: &str, marker: &str) -> Option<String> {
    let start = user_agent.find(marker)? + marker.len();
    let rest = &user_agent[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_agent_gets_sec_ch_ua_headers() {
        let headers = browser_headers(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        );
        assert!(headers.contains_key("sec-ch-ua"));
        assert_eq!(headers.get("sec-ch-ua-platform").unwrap(), "\"Windows\"");
    }

    #[test]
    fn firefox_agent_has_no_sec_ch_ua_headers() {
        let headers = browser_headers(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        );
        assert!(!headers.contains_key("sec-ch-ua"));
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn edge_agent_uses_edge_brand() {
        let headers = browser_headers(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        );
        assert!(headers.get("sec-ch-ua").unwrap().to_str().unwrap().contains("Microsoft Edge"));
    }
}
