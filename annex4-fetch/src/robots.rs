//! robots.txt parsing and allow/disallow resolution.
//!
//! The applicable rule is the most specific matching path (longest
//! normalized rule path wins), not the first or last one encountered —
//! this differs from a naive "first match wins" robots.txt reader.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub const DEFAULT_USER_AGENT: &str = "Annex4Monitor/1.0 (+https://github.com/your-org/annex4-monitor)";

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    path: String,
}

#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    rules: HashMap<String, Vec<Rule>>,
    crawl_delays: HashMap<String, f64>,
}

impl RobotsPolicy {
    pub fn parse(robots_content: &str) -> Self {
        let mut policy = RobotsPolicy::default();
        let mut current_agent = "*".to_string();

        for raw_line in robots_content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    current_agent = value.to_string();
                    policy.rules.entry(current_agent.clone()).or_default();
                }
                "disallow" => {
                    policy.rules.entry(current_agent.clone()).or_default().push(Rule {
                        allow: false,
                        path: value.to_string(),
                    });
                }
                "allow" => {
                    policy.rules.entry(current_agent.clone()).or_default().push(Rule {
                        allow: true,
                        path: value.to_string(),
                    });
                }
                "crawl-delay" => {
                    if let Ok(delay) = value.parse::<f64>() {
                        policy.crawl_delays.insert(current_agent.clone(), delay);
                    }
                }
                _ => {}
            }
        }

        policy
    }

    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        if let Some(rules) = self.rules.get(user_agent) {
            if let Some(allow) = Self::most_specific(rules, path) {
                return allow;
            }
        }
        if let Some(rules) = self.rules.get("*") {
            if let Some(allow) = Self::most_specific(rules, path) {
                return allow;
            }
        }
        true
    }

    pub fn crawl_delay(&self, user_agent: &str) -> f64 {
        self.crawl_delays
            .get(user_agent)
            .or_else(|| self.crawl_delays.get("*"))
            .copied()
            .unwrap_or(0.0)
    }

    fn most_specific(rules: &[Rule], path: &str) -> Option<bool> {
        rules
            .iter()
            .filter(|rule| Self::matches(path, &rule.path))
            .max_by_key(|rule| rule.path.len())
            .map(|rule| rule.allow)
    }

    fn matches(path: &str, rule_path: &str) -> bool {
        if rule_path.is_empty() {
            return false;
        }
        if path.starts_with(rule_path) {
            return true;
        }
        if rule_path.contains('*') {
            return wildcard_regex(rule_path).is_match(path);
        }
        false
    }
}

fn wildcard_regex(rule_path: &str) -> Regex {
    static CACHE: Lazy<std::sync::Mutex<HashMap<String, Regex>>> =
        Lazy::new(|| std::sync::Mutex::new(HashMap::new()));
    let mut cache = CACHE.lock().unwrap();
    if let Some(re) = cache.get(rule_path) {
        return re.clone();
    }
    let pattern = format!("^{}", regex::escape(rule_path).replace("\\*", ".*"));
    let re = Regex::new(&pattern).unwrap_or_else(|_| Regex::new("^$").unwrap());
    cache.insert(rule_path.to_string(), re.clone());
    re
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_blocks_matching_prefix() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private\n");
        assert!(!policy.is_allowed("/private/doc.html", "*"));
        assert!(policy.is_allowed("/public/doc.html", "*"));
    }

    #[test]
    fn more_specific_allow_overrides_shorter_disallow() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /docs\nAllow: /docs/public\n");
        assert!(policy.is_allowed("/docs/public/page.html", "*"));
        assert!(!policy.is_allowed("/docs/private/page.html", "*"));
    }

    #[test]
    fn crawl_delay_falls_back_to_wildcard_agent() {
        let policy = RobotsPolicy::parse("User-agent: *\nCrawl-delay: 5\n");
        assert_eq!(policy.crawl_delay("Annex4Monitor/1.0"), 5.0);
    }

    #[test]
    fn no_matching_rule_defaults_to_allowed() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private\n");
        assert!(policy.is_allowed("/", "*"));
    }
}
