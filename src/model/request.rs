use crate::extract::ExtractionRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the originating source name
pub const META_SOURCE: &str = "source";

/// Metadata key carrying the retry counter
pub const META_RETRY_COUNT: &str = "retry_count";

/// Metadata key carrying the earliest retry time (RFC 3339)
pub const META_RETRY_AFTER: &str = "retry_after";

/// Scheduling priority of a crawl request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Per-request crawl policy
///
/// Controls politeness, fetching limits, and content gating for a request
/// and all child requests derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlPolicy {
    /// Whether robots.txt rules are checked before fetching
    pub respect_robots_txt: bool,

    /// Minimum delay between requests to the same host (milliseconds)
    pub delay_ms: u64,

    /// Maximum number of retries for failed requests
    pub max_retries: u32,

    /// Request timeout (milliseconds)
    pub timeout_ms: u64,

    /// User agent string sent with each request
    pub user_agent: String,

    /// Maximum accepted response body size (bytes)
    pub max_content_length: usize,

    /// Content types accepted by the gate, matched as case-insensitive
    /// substrings of the response `content-type` header
    pub allowed_content_types: Vec<String>,

    /// Additional headers sent with each request
    pub headers: HashMap<String, String>,

    /// Whether redirects are followed
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow
    pub max_redirects: u32,
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            respect_robots_txt: true,
            delay_ms: 1000,
            max_retries: 3,
            timeout_ms: 30_000,
            user_agent: "inkcrawl/0.1".to_string(),
            max_content_length: 10 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            headers: HashMap::new(),
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

/// A single unit of crawl work
///
/// Requests are immutable once submitted. Child requests are derived with
/// [`CrawlRequest::child`], which copies the parent and overrides identity,
/// URL, depth, and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// Unique request identity
    pub id: String,

    /// Absolute URL to crawl
    pub url: String,

    /// Current depth (0 for seeds)
    pub depth: u32,

    /// Maximum depth to which children may be derived
    pub max_depth: u32,

    /// Extraction rules applied to the fetched page
    pub rules: Vec<ExtractionRule>,

    /// Crawl policy for this request
    pub policy: CrawlPolicy,

    /// Scheduling priority
    pub priority: Priority,

    /// Attribute map; `source` and `retry_count` live here
    pub metadata: HashMap<String, String>,

    /// Identity of the parent request, if derived
    pub parent_id: Option<String>,

    /// When the request was created
    pub created_at: DateTime<Utc>,
}

impl CrawlRequest {
    /// Creates a new seed request for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            depth: 0,
            max_depth: 2,
            rules: Vec::new(),
            policy: CrawlPolicy::default(),
            priority: Priority::Normal,
            metadata: HashMap::new(),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    /// Derives a child request for a discovered link
    ///
    /// The child copies the parent's rules, policy, priority, and metadata,
    /// with a fresh id and timestamp, `depth + 1`, and `parent_id` set.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL of the discovered link
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            depth: self.depth + 1,
            max_depth: self.max_depth,
            rules: self.rules.clone(),
            policy: self.policy.clone(),
            priority: self.priority,
            metadata: self.metadata.clone(),
            parent_id: Some(self.id.clone()),
            created_at: Utc::now(),
        }
    }

    /// Returns the source name this request was expanded from, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// Returns the retry counter stored in the attribute map
    pub fn retry_count(&self) -> u32 {
        self.metadata
            .get(META_RETRY_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Returns the earliest time this request may be retried, if one is set
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(META_RETRY_AFTER)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Returns a reclone with the retry counter incremented and the
    /// earliest retry time recorded in the attribute map
    ///
    /// `created_at` stays the reclone's actual creation time; the backoff
    /// gate lives under [`META_RETRY_AFTER`].
    pub fn with_retry(&self, ready_at: DateTime<Utc>) -> Self {
        let mut cloned = self.clone();
        cloned
            .metadata
            .insert(META_RETRY_COUNT.to_string(), (self.retry_count() + 1).to_string());
        cloned
            .metadata
            .insert(META_RETRY_AFTER.to_string(), ready_at.to_rfc3339());
        cloned.created_at = Utc::now();
        cloned
    }
}
