use crate::model::{CrawlRequest, WebPage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a crawl request
///
/// These wire values are exposed in results and must round-trip through
/// serialisation unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlStatus {
    Success,
    Failed,
    Skipped,
    RobotsBlocked,
    Timeout,
    TooManyRetries,
    ContentTooLarge,
    UnsupportedContentType,
    NetworkError,
    ParseError,
}

impl CrawlStatus {
    /// True only for [`CrawlStatus::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, CrawlStatus::Success)
    }
}

/// Timing and size metrics collected while processing one request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrawlMetrics {
    /// Time spent downloading the page (milliseconds)
    pub download_ms: u64,
    /// Time spent parsing the page (milliseconds)
    pub parse_ms: u64,
    /// Time spent running extraction rules (milliseconds)
    pub extraction_ms: u64,
    /// Total pipeline time (milliseconds)
    pub total_ms: u64,
    /// Response body size (bytes)
    pub content_bytes: usize,
    /// Number of fields produced by extraction
    pub extracted_field_count: usize,
}

/// The outcome of processing one crawl request
///
/// Exactly one result is emitted per submitted request. `page` is non-null
/// iff `status` is `Success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    /// The request that was processed
    pub request: CrawlRequest,

    /// The crawled page; present iff `status` is `Success`
    pub page: Option<WebPage>,

    /// Terminal status
    pub status: CrawlStatus,

    /// Error description for non-success statuses
    pub error: Option<String>,

    /// Child requests derived from discovered links
    pub new_requests: Vec<CrawlRequest>,

    /// When the result was produced
    pub completed_at: DateTime<Utc>,

    /// Timing and size metrics
    pub metrics: CrawlMetrics,
}

impl CrawlResult {
    /// Builds a terminal non-success result for a request
    pub fn failure(
        request: CrawlRequest,
        status: CrawlStatus,
        error: impl Into<String>,
        metrics: CrawlMetrics,
    ) -> Self {
        Self {
            request,
            page: None,
            status,
            error: Some(error.into()),
            new_requests: Vec::new(),
            completed_at: Utc::now(),
            metrics,
        }
    }

    /// Builds a success result carrying the page and derived children
    pub fn success(
        request: CrawlRequest,
        page: WebPage,
        new_requests: Vec<CrawlRequest>,
        metrics: CrawlMetrics,
    ) -> Self {
        Self {
            request,
            page: Some(page),
            status: CrawlStatus::Success,
            error: None,
            new_requests,
            completed_at: Utc::now(),
            metrics,
        }
    }
}
