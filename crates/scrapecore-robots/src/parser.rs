//! Robots.txt directive grammar: `User-agent`, `Disallow`, `Allow`,
//! `Sitemap`, `Host`, `Crawl-delay`. Unknown directives are ignored
//! (spec.md §4.1).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    agents: Vec<String>,
    rules: Vec<(bool, String)>, // (is_allow, path_prefix)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRuleSet {
    sections: Vec<Section>,
    crawl_delays: Vec<(String, u64)>, // agent -> crawl-delay seconds, bit-pattern for Eq
    pub sitemaps: Vec<String>,
}

// f64 has no total Eq; store crawl delays as bit patterns so RobotsRuleSet
// can derive PartialEq/Eq for cache-entry comparisons in tests.

impl RobotsRuleSet {
    pub fn parse(raw: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        let mut crawl_delays: Vec<(String, u64)> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut current: Option<Section> = None;
        let mut current_agents_pending = true;

        for line in raw.lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !current_agents_pending {
                        if let Some(section) = current.take() {
                            sections.push(section);
                        }
                        current = Some(Section::default());
                        current_agents_pending = true;
                    }
                    let section = current.get_or_insert_with(Section::default);
                    section.agents.push(value.to_lowercase());
                }
                "disallow" => {
                    current_agents_pending = false;
                    if let Some(section) = current.as_mut() {
                        if !value.is_empty() {
                            section.rules.push((false, value.to_string()));
                        } else {
                            // Disallow: (empty) means allow everything.
                            section.rules.push((true, String::new()));
                        }
                    }
                }
                "allow" => {
                    current_agents_pending = false;
                    if let Some(section) = current.as_mut() {
                        section.rules.push((true, value.to_string()));
                    }
                }
                "crawl-delay" => {
                    current_agents_pending = false;
                    if let (Some(section), Ok(delay)) =
                        (current.as_ref(), value.parse::<f64>())
                    {
                        for agent in &section.agents {
                            crawl_delays.push((agent.clone(), delay.to_bits()));
                        }
                    }
                }
                "sitemap" => {
                    sitemaps.push(value.to_string());
                }
                "host" => {
                    // Non-standard, informational only; ignored.
                }
                _ => {}
            }
        }
        if let Some(section) = current.take() {
            sections.push(section);
        }

        Self {
            sections,
            crawl_delays,
            sitemaps,
        }
    }

    /// A URL is allowed unless the longest matching rule in the most
    /// specific matching `User-agent` section is a `Disallow`. `*` is the
    /// fallback section (spec.md §4.1).
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let ua = user_agent.to_lowercase();
        let section = self.most_specific_section(&ua);
        let Some(section) = section else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for (is_allow, prefix) in &section.rules {
            if path.starts_with(prefix.as_str()) {
                let len = prefix.len();
                let better = match best {
                    Some((best_len, _)) => len >= best_len,
                    None => true,
                };
                if better {
                    best = Some((len, *is_allow));
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let ua = user_agent.to_lowercase();
        self.crawl_delays
            .iter()
            .find(|(agent, _)| *agent == ua)
            .or_else(|| self.crawl_delays.iter().find(|(agent, _)| agent == "*"))
            .map(|(_, bits)| f64::from_bits(*bits))
    }

    fn most_specific_section(&self, ua: &str) -> Option<&Section> {
        // An exact (non-wildcard) agent match wins over `*`.
        self.sections
            .iter()
            .find(|s| s.agents.iter().any(|a| a == ua))
            .or_else(|| self.sections.iter().find(|s| s.agents.iter().any(|a| a == "*")))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_all_blocks_everything() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow: /\n");
        assert!(!rules.is_allowed("ScrapeCoreBot", "/anything"));
    }

    #[test]
    fn empty_disallow_allows_everything() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("ScrapeCoreBot", "/anything"));
    }

    #[test]
    fn most_specific_rule_wins() {
        let rules = RobotsRuleSet::parse("User-agent: *\nDisallow: /admin\nAllow: /admin/public\n");
        assert!(rules.is_allowed("bot", "/admin/public/page"));
        assert!(!rules.is_allowed("bot", "/admin/secret"));
    }

    #[test]
    fn exact_agent_section_overrides_wildcard() {
        let rules = RobotsRuleSet::parse(
            "User-agent: *\nDisallow: /\nUser-agent: goodbot\nDisallow:\n",
        );
        assert!(!rules.is_allowed("otherbot", "/x"));
        assert!(rules.is_allowed("goodbot", "/x"));
    }

    #[test]
    fn crawl_delay_parsed_per_agent() {
        let rules = RobotsRuleSet::parse("User-agent: *\nCrawl-delay: 2.5\n");
        assert_eq!(rules.crawl_delay("anybot"), Some(2.5));
    }

    #[test]
    fn sitemaps_collected_regardless_of_section() {
        let rules = RobotsRuleSet::parse(
            "Sitemap: https://example.com/sitemap.xml\nUser-agent: *\nDisallow:\n",
        );
        assert_eq!(rules.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let rules = RobotsRuleSet::parse("User-agent: *\nFoo-Bar: baz\nDisallow:\n");
        assert!(rules.is_allowed("bot", "/"));
    }
}
