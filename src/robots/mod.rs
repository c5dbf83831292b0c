//! Robots.txt service
//!
//! This module provides fetching, parsing, and caching of robots.txt files.
//! The cache is capacity-bounded and keyed by URL authority, with a 6-hour
//! write-expiry. Fetch failures degrade to an empty rule set that allows
//! everything, so an unreachable robots.txt never blocks a host.

mod cache;
mod parser;

pub use cache::{CachedRobots, CACHE_TTL_HOURS};
pub use parser::{RobotsGroup, RobotsRules};

use crate::url::{authority_of, path_of};
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default maximum number of hosts held in the cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Fetches, parses, and caches robots.txt rules per host
///
/// Reads go straight to the concurrent map; a miss funnels through a single
/// lock with a recheck, so concurrent workers fetch each host's robots.txt
/// once.
pub struct RobotsService {
    client: reqwest::Client,
    cache: DashMap<String, CachedRobots>,
    fetch_lock: Mutex<()>,
    capacity: usize,
}

impl RobotsService {
    /// Creates a service with the default capacity
    pub fn new(user_agent: &str) -> Self {
        Self::with_capacity(user_agent, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a service with an explicit cache capacity
    pub fn with_capacity(user_agent: &str, capacity: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            cache: DashMap::new(),
            fetch_lock: Mutex::new(()),
            capacity,
        }
    }

    /// Checks whether a URL may be crawled by the given user agent
    ///
    /// Looks up the exact lower-cased user-agent, falling back to `*`; when
    /// neither group exists the URL is allowed. Otherwise the URL is
    /// disallowed iff its path starts with any disallow prefix.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The crawler's user agent string
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let rules = match self.rules_for_url(url).await {
            Some(rules) => rules,
            None => return true,
        };
        rules.is_allowed(&path_of(url), user_agent)
    }

    /// Returns the crawl delay declared for the URL's host, in milliseconds
    pub async fn crawl_delay_ms(&self, url: &str, user_agent: &str) -> Option<u64> {
        self.rules_for_url(url)
            .await
            .and_then(|rules| rules.crawl_delay_ms(user_agent))
    }

    /// Returns the sitemap URLs declared for the URL's host
    pub async fn sitemaps(&self, url: &str) -> Vec<String> {
        self.rules_for_url(url)
            .await
            .map(|rules| rules.sitemaps)
            .unwrap_or_default()
    }

    /// Drops any cached entry for the URL's host and fetches fresh rules
    pub async fn refresh(&self, url: &str) {
        if let Some(key) = authority_of(url) {
            self.cache.remove(&key);
        }
        let _ = self.rules_for_url(url).await;
    }

    /// Warms the cache for a host before crawling begins
    pub async fn prefetch(&self, url: &str) {
        let _ = self.rules_for_url(url).await;
    }

    /// Clears the whole cache
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of hosts currently cached
    pub fn cached_hosts(&self) -> usize {
        self.cache.len()
    }

    /// Test hook: installs parsed rules for an authority without fetching
    #[cfg(test)]
    pub(crate) fn seed_rules(&self, authority: &str, rules: RobotsRules) {
        self.cache
            .insert(authority.to_string(), CachedRobots::new(rules));
    }

    /// Returns the rules for a URL's host, fetching on miss or staleness
    async fn rules_for_url(&self, url: &str) -> Option<RobotsRules> {
        let key = authority_of(url)?;

        if let Some(entry) = self.cache.get(&key) {
            if !entry.is_stale() {
                return Some(entry.rules.clone());
            }
        }

        // Double-checked locked insert: recheck under the lock so only one
        // worker fetches a given host.
        let _guard = self.fetch_lock.lock().await;
        if let Some(entry) = self.cache.get(&key) {
            if !entry.is_stale() {
                return Some(entry.rules.clone());
            }
        }

        let scheme = ::url::Url::parse(url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_else(|_| "https".to_string());
        let rules = self.fetch_rules(&scheme, &key).await;

        self.evict_if_full();
        self.cache.insert(key, CachedRobots::new(rules.clone()));
        Some(rules)
    }

    /// Fetches and parses robots.txt for one authority
    ///
    /// Non-2xx responses and network errors yield an empty, allow-all rule
    /// set.
    async fn fetch_rules(&self, scheme: &str, authority: &str) -> RobotsRules {
        let robots_url = format!("{}://{}/robots.txt", scheme, authority);
        tracing::debug!("Fetching robots.txt from {}", robots_url);

        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(content) => RobotsRules::parse(&content),
                Err(e) => {
                    tracing::warn!("Failed to read robots.txt body for {}: {}", authority, e);
                    RobotsRules::allow_all()
                }
            },
            Ok(response) => {
                tracing::debug!(
                    "robots.txt for {} returned status {}, allowing all",
                    authority,
                    response.status()
                );
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::debug!(
                    "Failed to fetch robots.txt for {}: {}, allowing all",
                    authority,
                    e
                );
                RobotsRules::allow_all()
            }
        }
    }

    /// Evicts the oldest entry when the cache is at capacity
    fn evict_if_full(&self) {
        if self.cache.len() < self.capacity {
            return;
        }
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.fetched_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            tracing::debug!("Robots cache at capacity, evicting {}", key);
            self.cache.remove(&key);
        }
    }
}
