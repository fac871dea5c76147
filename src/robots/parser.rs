//! Robots.txt parser and rule matcher
//!
//! Every `User-agent` line opens a new rule block. Rules from all blocks that
//! apply to an agent are pooled and the longest matching pattern decides,
//! with `Allow` winning ties.

/// Rules declared under one `User-agent` line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleGroup {
    /// Lower-cased agent token (`*` for the wildcard group)
    pub user_agent: String,
    pub allow: Vec<String>,
    pub disallow: Vec<String>,

    /// Crawl delay in seconds
    pub crawl_delay: Option<f64>,
}

impl RuleGroup {
    fn applies_to(&self, agent: &str) -> bool {
        self.user_agent == "*" || (!self.user_agent.is_empty() && agent.contains(&self.user_agent))
    }
}

/// Parsed robots.txt for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRecord {
    pub rules: Vec<RuleGroup>,
    pub sitemaps: Vec<String>,
}

impl RobotsRecord {
    /// A record with no rules allows everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses robots.txt content
    ///
    /// Unknown directives, comments and malformed lines are ignored. Rules
    /// that appear before any `User-agent` line have no block and are dropped.
    pub fn parse(content: &str) -> Self {
        let mut record = Self::default();
        let mut current: Option<RuleGroup> = None;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if let Some(group) = current.take() {
                        record.rules.push(group);
                    }
                    current = Some(RuleGroup {
                        user_agent: value.to_ascii_lowercase(),
                        ..RuleGroup::default()
                    });
                }
                "allow" => {
                    if let Some(group) = current.as_mut() {
                        if !value.is_empty() {
                            group.allow.push(value.to_string());
                        }
                    }
                }
                "disallow" => {
                    if let Some(group) = current.as_mut() {
                        if !value.is_empty() {
                            group.disallow.push(value.to_string());
                        }
                    }
                }
                "crawl-delay" => {
                    if let (Some(group), Ok(delay)) = (current.as_mut(), value.parse::<f64>()) {
                        if delay.is_finite() && delay >= 0.0 {
                            group.crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        record.sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        if let Some(group) = current {
            record.rules.push(group);
        }

        record
    }

    /// Checks whether a path (with optional query) may be fetched by `agent`
    pub fn is_allowed(&self, path: &str, agent: &str) -> bool {
        let agent = agent.to_ascii_lowercase();
        let path = if path.is_empty() { "/" } else { path };

        let mut best: Option<(usize, bool)> = None;

        for group in self.rules.iter().filter(|g| g.applies_to(&agent)) {
            let candidates = group
                .allow
                .iter()
                .map(|p| (p, true))
                .chain(group.disallow.iter().map(|p| (p, false)));

            for (pattern, allow) in candidates {
                if !pattern_matches(pattern, path) {
                    continue;
                }

                let length = pattern.len();
                best = match best {
                    None => Some((length, allow)),
                    Some((best_len, _)) if length > best_len => Some((length, allow)),
                    Some((best_len, best_allow)) if length == best_len => {
                        Some((length, best_allow || allow))
                    }
                    keep => keep,
                };
            }
        }

        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    /// Crawl delay for `agent`, preferring a specific group over `*`
    pub fn crawl_delay(&self, agent: &str) -> Option<f64> {
        let agent = agent.to_ascii_lowercase();
        let specific = self
            .rules
            .iter()
            .filter(|g| g.user_agent != "*" && g.applies_to(&agent))
            .find_map(|g| g.crawl_delay);

        specific.or_else(|| {
            self.rules
                .iter()
                .filter(|g| g.user_agent == "*")
                .find_map(|g| g.crawl_delay)
        })
    }
}

/// Matches a robots pattern against a path
///
/// `*` matches any run of characters and a trailing `$` anchors the end;
/// otherwise the pattern only has to match a prefix of the path.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let pattern = pattern.as_bytes();
    let path = path.as_bytes();

    // positions[i] is true when the pattern consumed so far can end at path[i]
    let mut positions = vec![false; path.len() + 1];
    positions[0] = true;

    for &p in pattern {
        let mut next = vec![false; path.len() + 1];
        if p == b'*' {
            let mut reachable = false;
            for i in 0..=path.len() {
                reachable |= positions[i];
                next[i] = reachable;
            }
        } else {
            for i in 0..path.len() {
                if positions[i] && path[i] == p {
                    next[i + 1] = true;
                }
            }
        }
        positions = next;
        if !positions.iter().any(|&reachable| reachable) {
            return false;
        }
    }

    if anchored {
        positions[path.len()]
    } else {
        positions.iter().any(|&reachable| reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks_and_sitemaps() {
        let content = r#"
# comment
User-agent: *
Disallow: /private
Allow: /private/public
Crawl-delay: 2

User-agent: SumiTrawl
Disallow: /no-trawl   # trailing comment

Sitemap: https://example.com/sitemap.xml
"#;
        let record = RobotsRecord::parse(content);

        assert_eq!(record.rules.len(), 2);
        assert_eq!(record.rules[0].user_agent, "*");
        assert_eq!(record.rules[0].disallow, vec!["/private"]);
        assert_eq!(record.rules[0].allow, vec!["/private/public"]);
        assert_eq!(record.rules[0].crawl_delay, Some(2.0));
        assert_eq!(record.rules[1].disallow, vec!["/no-trawl"]);
        assert_eq!(record.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn test_consecutive_user_agents_open_separate_blocks() {
        let record = RobotsRecord::parse("User-agent: a\nUser-agent: b\nDisallow: /x\n");
        assert_eq!(record.rules.len(), 2);
        assert!(record.rules[0].disallow.is_empty());
        assert!(record.is_allowed("/x", "a"));
        assert!(!record.is_allowed("/x", "b"));
    }

    #[test]
    fn test_longest_match_wins() {
        let record = RobotsRecord::parse("User-agent: *\nDisallow: /a\nAllow: /a/b\n");
        assert!(record.is_allowed("/a/b/c", "*"));
        assert!(!record.is_allowed("/a/c", "*"));
        assert!(record.is_allowed("/other", "*"));
    }

    #[test]
    fn test_allow_wins_ties() {
        let record = RobotsRecord::parse("User-agent: *\nDisallow: /x\nAllow: /x\n");
        assert!(record.is_allowed("/x", "*"));
    }

    #[test]
    fn test_agent_and_wildcard_blocks_are_pooled() {
        let content = "User-agent: *\nDisallow: /shared\n\nUser-agent: sumitrawl\nAllow: /shared/open\nDisallow: /mine\n";
        let record = RobotsRecord::parse(content);

        assert!(!record.is_allowed("/shared/x", "SumiTrawl"));
        assert!(record.is_allowed("/shared/open/page", "SumiTrawl"));
        assert!(!record.is_allowed("/mine", "SumiTrawl"));
        assert!(record.is_allowed("/mine", "OtherBot"));
    }

    #[test]
    fn test_wildcards_and_anchor() {
        assert!(pattern_matches("/*.php$", "/index.php"));
        assert!(!pattern_matches("/*.php$", "/index.php?x=1"));
        assert!(pattern_matches("/*.php", "/index.php?x=1"));
        assert!(pattern_matches("/search*q=", "/search/results?q=rust"));
        assert!(pattern_matches("/", "/anything"));
        assert!(!pattern_matches("/admin", "/adm"));
        assert!(pattern_matches("/fish$", "/fish"));
        assert!(!pattern_matches("/fish$", "/fishing"));
    }

    #[test]
    fn test_query_is_part_of_the_path() {
        let record = RobotsRecord::parse("User-agent: *\nDisallow: /*?sort=\n");
        assert!(!record.is_allowed("/list?sort=asc", "*"));
        assert!(record.is_allowed("/list", "*"));
    }

    #[test]
    fn test_empty_record_allows_everything() {
        assert!(RobotsRecord::allow_all().is_allowed("/anything", "bot"));
        let record = RobotsRecord::parse("User-agent: *\nDisallow:\n");
        assert!(record.is_allowed("/anything", "bot"));
    }

    #[test]
    fn test_crawl_delay_prefers_specific_agent() {
        let content = "User-agent: *\nCrawl-delay: 5\n\nUser-agent: sumitrawl\nCrawl-delay: 1.5\n";
        let record = RobotsRecord::parse(content);
        assert_eq!(record.crawl_delay("SumiTrawl/0.1"), Some(1.5));
        assert_eq!(record.crawl_delay("OtherBot"), Some(5.0));
        assert_eq!(RobotsRecord::allow_all().crawl_delay("x"), None);
    }
}
