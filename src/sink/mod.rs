//! Result sink
//!
//! The engine persists through the [`ResultSink`] trait; [`MemorySink`] is
//! the in-memory implementation. The sink also owns the retry policy: a
//! `FAILED` result is recloned with an incremented retry counter and a
//! retry-after gate in its attribute map, and
//! [`ResultSink::failed_for_retry`] hands ready entries back to the caller
//! for re-submission.

use crate::model::{CrawlRequest, CrawlResult, CrawlStatus, WebPage};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Minutes a URL counts as recently crawled by default
pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 60;

/// Minutes a failed request waits before it is ready for retry
const RETRY_BACKOFF_MINUTES: i64 = 5;

/// Persistence failures
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink storage error: {0}")]
    Storage(String),
}

/// Per-source crawl statistics reported by a sink
#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    /// Total results recorded for the source
    pub total: u64,

    /// Result counts by status
    pub by_status: HashMap<CrawlStatus, u64>,
}

/// Persistence seam consumed by the page pipeline
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Records a completed result
    async fn save_result(&self, result: &CrawlResult) -> Result<(), SinkError>;

    /// Records a crawled page
    async fn save_page(&self, page: &WebPage) -> Result<(), SinkError>;

    /// Checks whether a URL was crawled within the given window
    ///
    /// Must be cheap; workers call it once per request.
    async fn was_recently_crawled(&self, url: &str, within_minutes: i64) -> bool;

    /// Looks up the most recent result for a URL
    async fn find_result(&self, url: &str) -> Option<CrawlResult>;

    /// Looks up the most recent page for a URL
    async fn find_page(&self, url: &str) -> Option<WebPage>;

    /// Reports statistics for one source
    async fn crawl_stats(&self, source: &str) -> SinkStats;

    /// Drains failed requests that are ready to retry
    ///
    /// Entries past their `retry_after` gate with a retry count within
    /// `max_retries` are removed and returned; re-submitting them is the
    /// caller's responsibility.
    async fn failed_for_retry(&self, max_retries: u32) -> Vec<CrawlRequest>;
}

/// In-memory sink
///
/// Results and pages are keyed by URL; the dedup check reads a last-seen
/// map with minute precision; the retry list is mutex-guarded.
#[derive(Default)]
pub struct MemorySink {
    results: RwLock<HashMap<String, CrawlResult>>,
    pages: RwLock<HashMap<String, WebPage>>,
    last_seen: DashMap<String, i64>,
    retry: Mutex<Vec<CrawlRequest>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every stored result, keyed by URL
    pub fn as_map(&self) -> HashMap<String, CrawlResult> {
        let results = self.results.read().expect("results lock poisoned");
        results
            .iter()
            .map(|(url, result)| (url.clone(), result.clone()))
            .collect()
    }

    /// Marks a URL as crawled now, at minute precision
    fn mark_seen(&self, url: &str) {
        self.last_seen
            .insert(url.to_string(), Utc::now().timestamp() / 60);
    }

    /// Test hook: marks a URL as crawled at an arbitrary minute offset
    pub fn mark_crawled_minutes_ago(&self, url: &str, minutes: i64) {
        self.last_seen
            .insert(url.to_string(), Utc::now().timestamp() / 60 - minutes);
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn save_result(&self, result: &CrawlResult) -> Result<(), SinkError> {
        if result.status == CrawlStatus::Success {
            self.mark_seen(&result.request.url);
        }

        if result.status == CrawlStatus::Failed {
            let ready_at = Utc::now() + Duration::minutes(RETRY_BACKOFF_MINUTES);
            let reclone = result.request.with_retry(ready_at);
            let mut retry = self.retry.lock().expect("retry lock poisoned");
            retry.push(reclone);
        }

        let mut results = self.results.write().expect("results lock poisoned");
        results.insert(result.request.url.clone(), result.clone());
        Ok(())
    }

    async fn save_page(&self, page: &WebPage) -> Result<(), SinkError> {
        self.mark_seen(&page.url);
        let mut pages = self.pages.write().expect("pages lock poisoned");
        pages.insert(page.url.clone(), page.clone());
        Ok(())
    }

    async fn was_recently_crawled(&self, url: &str, within_minutes: i64) -> bool {
        match self.last_seen.get(url) {
            Some(seen_minute) => {
                let now_minute = Utc::now().timestamp() / 60;
                now_minute - *seen_minute < within_minutes
            }
            None => false,
        }
    }

    async fn find_result(&self, url: &str) -> Option<CrawlResult> {
        let results = self.results.read().expect("results lock poisoned");
        results.get(url).cloned()
    }

    async fn find_page(&self, url: &str) -> Option<WebPage> {
        let pages = self.pages.read().expect("pages lock poisoned");
        pages.get(url).cloned()
    }

    async fn crawl_stats(&self, source: &str) -> SinkStats {
        let results = self.results.read().expect("results lock poisoned");
        let mut stats = SinkStats::default();
        for result in results.values() {
            if result.request.source() == Some(source) {
                stats.total += 1;
                *stats.by_status.entry(result.status).or_insert(0) += 1;
            }
        }
        stats
    }

    async fn failed_for_retry(&self, max_retries: u32) -> Vec<CrawlRequest> {
        let now = Utc::now();
        let mut retry = self.retry.lock().expect("retry lock poisoned");
        let mut ready = Vec::new();
        retry.retain(|request| {
            let gate_open = request.retry_after().map_or(true, |at| at <= now);
            if request.retry_count() <= max_retries && gate_open {
                ready.push(request.clone());
                false
            } else {
                true
            }
        });
        ready
    }
}
