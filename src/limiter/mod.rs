//! Per-domain rate limiter
//!
//! Coordinates politeness across workers: for each host the limiter holds
//! the most recent crawl time and the robots-declared crawl delay, and
//! computes the wait a worker must observe before fetching. The delay is a
//! politeness floor, not a strict lock; two workers may race on the same
//! host.

use crate::robots::RobotsService;
use crate::url::host_of;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Per-domain politeness limiter
pub struct DomainRateLimiter {
    robots: Arc<RobotsService>,

    /// Fallback delay when robots.txt declares none
    default_delay_ms: u64,

    /// Most recent crawl time per host (epoch milliseconds)
    last_crawl: DashMap<String, i64>,

    /// Cached robots crawl delay per host
    robots_delay: DashMap<String, u64>,
}

impl DomainRateLimiter {
    /// Creates a limiter backed by the given robots service
    pub fn new(robots: Arc<RobotsService>, default_delay_ms: u64) -> Self {
        Self {
            robots,
            default_delay_ms,
            last_crawl: DashMap::new(),
            robots_delay: DashMap::new(),
        }
    }

    /// Computes how long a worker must wait before fetching a URL
    ///
    /// The base delay is the larger of the request policy's delay and the
    /// host's robots crawl-delay (the limiter default when robots declares
    /// none), counted from the most recent crawl of the host.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL about to be fetched
    /// * `user_agent` - The crawler's user agent string
    /// * `policy_delay_ms` - The request policy's inter-request delay
    pub async fn compute_wait(&self, url: &str, user_agent: &str, policy_delay_ms: u64) -> Duration {
        let host = match host_of(url) {
            Some(host) => host,
            None => return Duration::ZERO,
        };

        let base_delay = self
            .base_delay_for(&host, url, user_agent)
            .await
            .max(policy_delay_ms);
        let last = self.last_crawl.get(&host).map(|entry| *entry);

        match last {
            Some(last_millis) => {
                let elapsed = Utc::now().timestamp_millis() - last_millis;
                let remaining = base_delay as i64 - elapsed;
                if remaining > 0 {
                    Duration::from_millis(remaining as u64)
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        }
    }

    /// Records that a crawl of the host happened now
    ///
    /// Called unconditionally after each attempt, successful or not.
    pub fn note_crawl(&self, url: &str) {
        if let Some(host) = host_of(url) {
            self.last_crawl.insert(host, Utc::now().timestamp_millis());
        }
    }

    /// Waits out the politeness delay for a URL, then records the crawl
    pub async fn wait_for(&self, url: &str, user_agent: &str, policy_delay_ms: u64) {
        let wait = self.compute_wait(url, user_agent, policy_delay_ms).await;
        if !wait.is_zero() {
            tracing::trace!("Politeness wait of {:?} for {}", wait, url);
            tokio::time::sleep(wait).await;
        }
        self.note_crawl(url);
    }

    /// Returns the host's base delay, consulting robots.txt once per host
    async fn base_delay_for(&self, host: &str, url: &str, user_agent: &str) -> u64 {
        if let Some(cached) = self.robots_delay.get(host) {
            return *cached;
        }

        let delay = self
            .robots
            .crawl_delay_ms(url, user_agent)
            .await
            .unwrap_or(self.default_delay_ms);
        self.robots_delay.insert(host.to_string(), delay);
        delay
    }
}
