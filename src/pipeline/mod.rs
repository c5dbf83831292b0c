//! Page pipeline
//!
//! A single operation, [`PagePipeline::execute`], takes one request through
//! the fixed step order: dedup check → robots check → fetch → content-type
//! gate → size gate → extraction → link/image/metadata extraction → child
//! generation → persist. Each step short-circuits to a terminal result on
//! its mapped status; every result, terminal or successful, is persisted.

use crate::extract;
use crate::fetch::Fetcher;
use crate::model::{
    CrawlMetrics, CrawlRequest, CrawlResult, CrawlStatus, PageMetadata, WebPage,
};
use crate::robots::RobotsService;
use crate::sink::{ResultSink, DEFAULT_DEDUP_WINDOW_MINUTES};
use crate::url::{is_valid_http_url, same_host};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Cap on child requests derived from one parent
const MAX_CHILDREN_PER_PAGE: usize = 100;

/// Orchestrates the per-page crawl steps
pub struct PagePipeline {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn ResultSink>,
    robots: Arc<RobotsService>,
}

impl PagePipeline {
    /// Creates a pipeline over the given collaborators
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn ResultSink>,
        robots: Arc<RobotsService>,
    ) -> Self {
        Self {
            fetcher,
            sink,
            robots,
        }
    }

    /// Processes one request to a terminal result
    ///
    /// Never returns an error; every failure mode maps to a status on the
    /// result. The result (and page, on success) is persisted before
    /// returning; persistence failures are logged and do not change the
    /// returned status.
    pub async fn execute(&self, request: CrawlRequest) -> CrawlResult {
        let started = Instant::now();
        let mut metrics = CrawlMetrics::default();

        // Dedup check
        if self
            .sink
            .was_recently_crawled(&request.url, DEFAULT_DEDUP_WINDOW_MINUTES)
            .await
        {
            tracing::debug!("Skipping recently crawled URL {}", request.url);
            return self
                .finish_failure(request, CrawlStatus::Skipped, "Recently crawled", metrics, started)
                .await;
        }

        // Robots check
        if request.policy.respect_robots_txt
            && !self
                .robots
                .is_allowed(&request.url, &request.policy.user_agent)
                .await
        {
            return self
                .finish_failure(
                    request,
                    CrawlStatus::RobotsBlocked,
                    "Blocked by robots.txt",
                    metrics,
                    started,
                )
                .await;
        }

        // Fetch
        let download_started = Instant::now();
        let mut response = self.fetcher.fetch(&request).await;
        metrics.download_ms = download_started.elapsed().as_millis() as u64;

        if response.timed_out {
            let error = response
                .error
                .take()
                .unwrap_or_else(|| "Request timed out".to_string());
            return self
                .finish_failure(request, CrawlStatus::Timeout, error, metrics, started)
                .await;
        }
        if let Some(error) = response.error.take() {
            return self
                .finish_failure(request, CrawlStatus::NetworkError, error, metrics, started)
                .await;
        }
        if !response.is_successful {
            let error = format!(
                "HTTP {}",
                response
                    .status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "error".to_string())
            );
            let status = failed_status(&request);
            return self
                .finish_failure(request, status, error, metrics, started)
                .await;
        }
        let body = match response.body {
            Some(ref body) if !body.is_empty() => body.clone(),
            _ => {
                return self
                    .finish_failure(
                        request,
                        CrawlStatus::NetworkError,
                        "Empty response body",
                        metrics,
                        started,
                    )
                    .await;
            }
        };

        // Content-type gate
        let content_type = response.header("content-type").unwrap_or("").to_string();
        if content_type.is_empty() {
            tracing::warn!("No content-type for {}, accepting", request.url);
        } else {
            let lowered = content_type.to_lowercase();
            let accepted = request
                .policy
                .allowed_content_types
                .iter()
                .any(|allowed| lowered.contains(&allowed.to_lowercase()));
            if !accepted {
                return self
                    .finish_failure(
                        request,
                        CrawlStatus::UnsupportedContentType,
                        format!("Unsupported content type: {}", content_type),
                        metrics,
                        started,
                    )
                    .await;
            }
        }

        // Size gate
        metrics.content_bytes = body.len();
        if body.len() > request.policy.max_content_length {
            let error_message = format!(
                "Content length {} exceeds limit {}",
                body.len(),
                request.policy.max_content_length
            );
            return self
                .finish_failure(
                    request,
                    CrawlStatus::ContentTooLarge,
                    error_message,
                    metrics,
                    started,
                )
                .await;
        }

        // Extraction
        let base_url = match Url::parse(&response.url).or_else(|_| Url::parse(&request.url)) {
            Ok(base_url) => base_url,
            Err(e) => {
                return self
                    .finish_failure(
                        request,
                        CrawlStatus::ParseError,
                        format!("Invalid base URL: {}", e),
                        metrics,
                        started,
                    )
                    .await;
            }
        };

        let extraction_started = Instant::now();
        let extracted_data =
            match extract::extract_data(&body, &content_type, &request.rules, &base_url) {
                Ok(fields) => fields,
                Err(e) => {
                    metrics.extraction_ms = extraction_started.elapsed().as_millis() as u64;
                    return self
                        .finish_failure(
                            request,
                            CrawlStatus::ParseError,
                            e.to_string(),
                            metrics,
                            started,
                        )
                        .await;
                }
            };
        metrics.extraction_ms = extraction_started.elapsed().as_millis() as u64;
        metrics.extracted_field_count = extracted_data.len();

        // Link, image, and metadata extraction
        let parse_started = Instant::now();
        let links = extract::extract_links(&body, &base_url);
        let images = extract::extract_images(&body, &base_url);
        let page_meta = extract::extract_metadata(&body);
        metrics.parse_ms = parse_started.elapsed().as_millis() as u64;

        // Child-request generation
        let new_requests: Vec<CrawlRequest> = if request.depth < request.max_depth {
            links
                .iter()
                .filter(|link| is_valid_http_url(link) && same_host(link, &request.url))
                .take(MAX_CHILDREN_PER_PAGE)
                .map(|link| request.child(link.clone()))
                .collect()
        } else {
            Vec::new()
        };

        let page = WebPage {
            url: response.url.clone(),
            title: page_meta.get("title").cloned(),
            content: body,
            extracted_data,
            links,
            images,
            metadata: PageMetadata {
                status_code: response.status_code,
                content_type: (!content_type.is_empty()).then(|| content_type.clone()),
                content_length: metrics.content_bytes,
                headers: response.headers.clone(),
                charset: page_meta.get("charset").cloned(),
                language: page_meta.get("language").cloned(),
            },
            request_id: request.id.clone(),
            depth: request.depth,
            source: request.source().map(str::to_string),
            response_time_ms: metrics.download_ms,
            fetched_at: Utc::now(),
        };

        metrics.total_ms = started.elapsed().as_millis() as u64;
        let result = CrawlResult::success(request, page.clone(), new_requests, metrics);

        // Persist
        if let Err(e) = self.sink.save_page(&page).await {
            tracing::warn!("Failed to persist page {}: {}", page.url, e);
        }
        if let Err(e) = self.sink.save_result(&result).await {
            tracing::warn!("Failed to persist result for {}: {}", result.request.url, e);
        }

        result
    }

    /// Builds, persists, and returns a terminal non-success result
    async fn finish_failure(
        &self,
        request: CrawlRequest,
        status: CrawlStatus,
        error: impl Into<String>,
        mut metrics: CrawlMetrics,
        started: Instant,
    ) -> CrawlResult {
        metrics.total_ms = started.elapsed().as_millis() as u64;
        let result = CrawlResult::failure(request, status, error, metrics);
        if let Err(e) = self.sink.save_result(&result).await {
            tracing::warn!("Failed to persist result for {}: {}", result.request.url, e);
        }
        result
    }
}

/// Picks `FAILED` or `TOO_MANY_RETRIES` for a generic failure
///
/// A request that has already burned its retry budget fails terminally so
/// the sink stops recloning it.
fn failed_status(request: &CrawlRequest) -> CrawlStatus {
    if request.retry_count() >= request.policy.max_retries {
        CrawlStatus::TooManyRetries
    } else {
        CrawlStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::model::ExtractedValue;
    use crate::robots::RobotsRules;
    use crate::sink::MemorySink;
    use crate::ExtractionRule;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned responses and counts fetch calls
    struct StaticFetcher {
        response: FetchResponse,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn html(body: &str) -> Self {
            let mut headers: HashMap<String, Vec<String>> = HashMap::new();
            headers.insert(
                "content-type".to_string(),
                vec!["text/html; charset=utf-8".to_string()],
            );
            Self {
                response: FetchResponse {
                    url: String::new(),
                    status_code: Some(200),
                    body: Some(body.to_string()),
                    headers,
                    is_successful: true,
                    error: None,
                    timed_out: false,
                },
                calls: AtomicUsize::new(0),
            }
        }

        fn with_content_type(mut self, content_type: &str) -> Self {
            self.response.headers.insert(
                "content-type".to_string(),
                vec![content_type.to_string()],
            );
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, request: &CrawlRequest) -> FetchResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut response = self.response.clone();
            if response.url.is_empty() {
                response.url = request.url.clone();
            }
            response
        }
    }

    fn pipeline_with(fetcher: Arc<StaticFetcher>) -> (PagePipeline, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let robots = Arc::new(RobotsService::new("TestBot/1.0"));
        (
            PagePipeline::new(fetcher, sink.clone(), robots),
            sink,
        )
    }

    fn request(url: &str) -> CrawlRequest {
        let mut request = CrawlRequest::new(url);
        request.policy.respect_robots_txt = false;
        request
    }

    #[tokio::test]
    async fn test_dedup_short_circuits_before_fetch() {
        let fetcher = Arc::new(StaticFetcher::html("<h1>Hi</h1>"));
        let (pipeline, sink) = pipeline_with(fetcher.clone());

        sink.mark_crawled_minutes_ago("https://a.test/", 5);
        let result = pipeline.execute(request("https://a.test/")).await;

        assert_eq!(result.status, CrawlStatus::Skipped);
        assert_eq!(result.error.as_deref(), Some("Recently crawled"));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_robots_block() {
        let fetcher = Arc::new(StaticFetcher::html("<h1>Hi</h1>"));
        let sink = Arc::new(MemorySink::new());
        let robots = Arc::new(RobotsService::new("TestBot/1.0"));
        robots.seed_rules(
            "a.test",
            RobotsRules::parse("User-agent: *\nDisallow: /private"),
        );
        let pipeline = PagePipeline::new(fetcher.clone(), sink, robots);

        let mut req = CrawlRequest::new("https://a.test/private/x");
        req.policy.respect_robots_txt = true;
        let result = pipeline.execute(req).await;

        assert_eq!(result.status, CrawlStatus::RobotsBlocked);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_happy_path_extracts_and_derives_children() {
        let fetcher = Arc::new(StaticFetcher::html(
            r#"<html><head><title>Home</title></head>
               <body><h1>Hi</h1><a href="/p2">n</a><a href="https://other.test/x">off</a></body></html>"#,
        ));
        let (pipeline, sink) = pipeline_with(fetcher);

        let mut req = request("https://a.test/index");
        req.max_depth = 2;
        req.rules = vec![ExtractionRule::text("title", "h1")];
        let result = pipeline.execute(req).await;

        assert_eq!(result.status, CrawlStatus::Success);
        let page = result.page.as_ref().unwrap();
        assert_eq!(
            page.extracted_data.get("title"),
            Some(&ExtractedValue::Text("Hi".to_string()))
        );
        assert_eq!(page.title.as_deref(), Some("Home"));

        // Only the same-host link becomes a child.
        assert_eq!(result.new_requests.len(), 1);
        let child = &result.new_requests[0];
        assert_eq!(child.url, "https://a.test/p2");
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_id.as_deref(), Some(result.request.id.as_str()));

        // Persisted through the sink.
        assert!(sink.find_page("https://a.test/index").await.is_some());
        assert!(sink.find_result("https://a.test/index").await.is_some());
    }

    #[tokio::test]
    async fn test_depth_limit_yields_no_children() {
        let fetcher = Arc::new(StaticFetcher::html(r#"<a href="/next">n</a>"#));
        let (pipeline, _) = pipeline_with(fetcher);

        let mut req = request("https://a.test/");
        req.depth = 2;
        req.max_depth = 2;
        let result = pipeline.execute(req).await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert!(result.new_requests.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let fetcher =
            Arc::new(StaticFetcher::html("%PDF-1.4").with_content_type("application/pdf"));
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/doc")).await;
        assert_eq!(result.status, CrawlStatus::UnsupportedContentType);
        assert!(result.page.is_none());
    }

    #[tokio::test]
    async fn test_empty_content_type_is_accepted() {
        let mut fetcher = StaticFetcher::html("<h1>Hi</h1>");
        fetcher.response.headers.clear();
        let (pipeline, _) = pipeline_with(Arc::new(fetcher));

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::Success);
    }

    #[tokio::test]
    async fn test_content_length_boundary() {
        let body = "x".repeat(100);
        let fetcher = Arc::new(StaticFetcher::html(&body));
        let (pipeline, _) = pipeline_with(fetcher);

        // Exactly at the limit passes.
        let mut req = request("https://a.test/exact");
        req.policy.max_content_length = 100;
        let result = pipeline.execute(req).await;
        assert_eq!(result.status, CrawlStatus::Success);

        // One byte over fails.
        let mut req = request("https://a.test/over");
        req.policy.max_content_length = 99;
        let result = pipeline.execute(req).await;
        assert_eq!(result.status, CrawlStatus::ContentTooLarge);
    }

    #[tokio::test]
    async fn test_network_error() {
        let fetcher = Arc::new(StaticFetcher {
            response: FetchResponse {
                url: "https://a.test/".to_string(),
                error: Some("connection refused".to_string()),
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        });
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::NetworkError);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_timeout_is_distinguished() {
        let fetcher = Arc::new(StaticFetcher {
            response: FetchResponse {
                url: "https://a.test/".to_string(),
                error: Some("deadline exceeded".to_string()),
                timed_out: true,
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        });
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::Timeout);
    }

    #[tokio::test]
    async fn test_http_error_status_is_failed() {
        let fetcher = Arc::new(StaticFetcher {
            response: FetchResponse {
                url: "https://a.test/".to_string(),
                status_code: Some(500),
                body: Some("oops".to_string()),
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        });
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_fails_terminally() {
        let fetcher = Arc::new(StaticFetcher {
            response: FetchResponse {
                url: "https://a.test/".to_string(),
                status_code: Some(500),
                body: Some("oops".to_string()),
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        });
        let (pipeline, _) = pipeline_with(fetcher);

        let mut req = request("https://a.test/");
        req.policy.max_retries = 2;
        req.metadata
            .insert(crate::model::META_RETRY_COUNT.to_string(), "2".to_string());
        let result = pipeline.execute(req).await;

        assert_eq!(result.status, CrawlStatus::TooManyRetries);
    }

    #[tokio::test]
    async fn test_empty_body_is_network_error() {
        let fetcher = Arc::new(StaticFetcher {
            response: FetchResponse {
                url: "https://a.test/".to_string(),
                status_code: Some(200),
                body: Some(String::new()),
                is_successful: true,
                ..Default::default()
            },
            calls: AtomicUsize::new(0),
        });
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::NetworkError);
    }

    #[tokio::test]
    async fn test_json_parse_error() {
        let fetcher =
            Arc::new(StaticFetcher::html("{broken").with_content_type("application/json"));
        let (pipeline, _) = pipeline_with(fetcher);

        let mut req = request("https://a.test/api");
        req.rules = vec![ExtractionRule::json_path("id", "$.id")];
        let result = pipeline.execute(req).await;
        assert_eq!(result.status, CrawlStatus::ParseError);
    }

    #[tokio::test]
    async fn test_required_rule_never_aborts() {
        let fetcher = Arc::new(StaticFetcher::html("<p>no heading here</p>"));
        let (pipeline, _) = pipeline_with(fetcher);

        let mut req = request("https://a.test/");
        req.rules = vec![ExtractionRule::text("title", "h1").required()];
        let result = pipeline.execute(req).await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(
            result.page.unwrap().extracted_data.get("title"),
            Some(&ExtractedValue::Text(String::new()))
        );
    }

    #[tokio::test]
    async fn test_metrics_total_covers_phases() {
        let fetcher = Arc::new(StaticFetcher::html("<h1>Hi</h1>"));
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        let metrics = result.metrics;
        assert!(metrics.total_ms >= metrics.download_ms + metrics.extraction_ms);
        assert!(metrics.content_bytes > 0);
    }

    #[tokio::test]
    async fn test_children_capped_at_limit() {
        let links: String = (0..150)
            .map(|i| format!(r#"<a href="/p{}">l</a>"#, i))
            .collect();
        let fetcher = Arc::new(StaticFetcher::html(&links));
        let (pipeline, _) = pipeline_with(fetcher);

        let result = pipeline.execute(request("https://a.test/")).await;
        assert_eq!(result.status, CrawlStatus::Success);
        assert_eq!(result.new_requests.len(), MAX_CHILDREN_PER_PAGE);
    }
}
