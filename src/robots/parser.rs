//! Robots.txt parser
//!
//! Line-based parsing with case-insensitive directive names. `User-agent:`
//! starts a new group (flushing the previous one), `Disallow:` appends a
//! non-blank path, `Crawl-delay:` stores a floating-point value in seconds
//! as milliseconds, and `Sitemap:` appends a URL. Comments and blank lines
//! are skipped; the final group is flushed at end of input.

use std::collections::HashMap;

/// Rules for one user-agent group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsGroup {
    /// Path prefixes this agent may not crawl
    pub disallow_paths: Vec<String>,

    /// Crawl delay in milliseconds, if declared
    pub crawl_delay_ms: Option<u64>,
}

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// Groups keyed by lower-cased user-agent
    pub groups: HashMap<String, RobotsGroup>,

    /// Sitemap URLs declared anywhere in the file
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    /// An empty rule set that allows everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses robots.txt content
    pub fn parse(content: &str) -> Self {
        let mut rules = RobotsRules::default();

        // Consecutive User-agent lines share the group that follows them.
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_group = RobotsGroup::default();
        let mut in_group_body = false;

        let mut flush =
            |agents: &mut Vec<String>, group: &mut RobotsGroup, rules: &mut RobotsRules| {
                for agent in agents.drain(..) {
                    rules.groups.insert(agent, group.clone());
                }
                *group = RobotsGroup::default();
            };

        for line in content.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let (directive, value) = match trimmed.split_once(':') {
                Some((d, v)) => (d.trim().to_lowercase(), v.trim()),
                None => continue,
            };

            match directive.as_str() {
                "user-agent" => {
                    if in_group_body {
                        flush(&mut current_agents, &mut current_group, &mut rules);
                        in_group_body = false;
                    }
                    if !value.is_empty() {
                        current_agents.push(value.to_lowercase());
                    }
                }
                "disallow" => {
                    in_group_body = true;
                    if !value.is_empty() {
                        current_group.disallow_paths.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    in_group_body = true;
                    if let Ok(seconds) = value.parse::<f64>() {
                        if seconds >= 0.0 {
                            current_group.crawl_delay_ms = Some((seconds * 1000.0) as u64);
                        }
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        rules.sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        flush(&mut current_agents, &mut current_group, &mut rules);
        rules
    }

    /// Serialises the rule set back to robots.txt syntax
    ///
    /// Group order follows the map's iteration order; parsing the output
    /// yields an identical rule set.
    pub fn serialize(&self) -> String {
        let mut out = String::new();

        for (agent, group) in &self.groups {
            out.push_str(&format!("User-agent: {}\n", agent));
            for path in &group.disallow_paths {
                out.push_str(&format!("Disallow: {}\n", path));
            }
            if let Some(delay_ms) = group.crawl_delay_ms {
                out.push_str(&format!("Crawl-delay: {}\n", delay_ms as f64 / 1000.0));
            }
            out.push('\n');
        }

        for sitemap in &self.sitemaps {
            out.push_str(&format!("Sitemap: {}\n", sitemap));
        }

        out
    }

    /// Looks up the group for a user-agent, falling back to `*`
    pub fn group_for(&self, user_agent: &str) -> Option<&RobotsGroup> {
        let lowered = user_agent.to_lowercase();
        self.groups.get(&lowered).or_else(|| self.groups.get("*"))
    }

    /// Checks whether a path is allowed for a user-agent
    ///
    /// Returns `true` when no group applies; otherwise `false` iff the path
    /// starts with any disallow prefix.
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        match self.group_for(user_agent) {
            Some(group) => !group
                .disallow_paths
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str())),
            None => true,
        }
    }

    /// Returns the crawl delay for a user-agent, in milliseconds
    pub fn crawl_delay_ms(&self, user_agent: &str) -> Option<u64> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay_ms)
    }
}
