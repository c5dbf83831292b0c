//! Robots.txt cache entries
//!
//! Entries live for the cache's write-expiry window (6 hours) or until
//! explicitly refreshed.

use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};

/// Default write-expiry for cached robots.txt rules
pub const CACHE_TTL_HOURS: i64 = 6;

/// Cached parsed robots.txt rules for one host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed rules
    pub rules: RobotsRules,

    /// When the rules were fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a cache entry stamped with the current time
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Checks whether the entry has outlived the write-expiry window
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(CACHE_TTL_HOURS)
    }

    /// Returns the age of the entry
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}
