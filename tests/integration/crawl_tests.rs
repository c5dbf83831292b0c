//! End-to-end crawl tests
//!
//! These tests run the engine against wiremock HTTP doubles and check the
//! externally observable behaviour: statuses, extracted fields, child
//! discovery, content gating, and per-host politeness.

use futures_util::StreamExt;
use inkcrawl::{
    CrawlEngine, CrawlRequest, CrawlStatus, EngineConfig, ExtractedValue, ExtractionRule,
    HttpFetcher, MemorySink,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds an engine over a real HTTP fetcher and a fresh in-memory sink
fn engine_with(config: EngineConfig) -> (CrawlEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    (CrawlEngine::new(config, fetcher, sink.clone()), sink)
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        max_concurrency: 4,
        queue_capacity: 64,
        result_buffer_size: 64,
        default_delay_ms: 0,
        ..Default::default()
    }
}

fn request(url: &str) -> CrawlRequest {
    let mut request = CrawlRequest::new(url);
    request.policy.respect_robots_txt = false;
    request.policy.delay_ms = 0;
    request
}

async fn allow_all_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_recently_crawled_url_is_skipped_without_fetching() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    // The page itself must never be requested.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let (engine, sink) = engine_with(fast_config());
    let url = format!("{}/", server.uri());
    sink.mark_crawled_minutes_ago(&url, 5);

    let mut stream = engine.start().unwrap();
    engine.submit(request(&url)).await.unwrap();

    let result = stream.next().await.unwrap();
    assert_eq!(result.status, CrawlStatus::Skipped);
    assert_eq!(result.error.as_deref(), Some("Recently crawled"));
    assert!(result.page.is_none());

    engine.stop();
}

#[tokio::test]
async fn test_robots_disallow_blocks_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let (engine, _sink) = engine_with(fast_config());
    let mut stream = engine.start().unwrap();

    let mut req = CrawlRequest::new(format!("{}/private/x", server.uri()));
    req.policy.respect_robots_txt = true;
    req.policy.delay_ms = 0;
    engine.submit(req).await.unwrap();

    let result = stream.next().await.unwrap();
    assert_eq!(result.status, CrawlStatus::RobotsBlocked);

    engine.stop();
}

#[tokio::test]
async fn test_happy_path_extracts_fields_and_follows_links() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/index"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><h1>Hi</h1><a href="/p2">n</a></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><h1>Page 2</h1></html>"#)
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let (engine, _sink) = engine_with(fast_config());
    let mut stream = engine.start().unwrap();

    let mut seed = request(&format!("{}/index", server.uri()));
    seed.max_depth = 1;
    seed.rules = vec![ExtractionRule::text("title", "h1")];
    engine.submit(seed).await.unwrap();

    let first = stream.next().await.unwrap();
    assert_eq!(first.status, CrawlStatus::Success);
    assert!(first.request.url.ends_with("/index"));
    let page = first.page.as_ref().unwrap();
    assert_eq!(
        page.extracted_data.get("title"),
        Some(&ExtractedValue::Text("Hi".to_string()))
    );
    assert_eq!(first.new_requests.len(), 1);
    assert!(first.new_requests[0].url.ends_with("/p2"));

    // The discovered child is crawled next.
    let second = stream.next().await.unwrap();
    assert_eq!(second.status, CrawlStatus::Success);
    assert!(second.request.url.ends_with("/p2"));
    assert_eq!(second.request.depth, 1);
    assert_eq!(
        second.page.unwrap().extracted_data.get("title"),
        Some(&ExtractedValue::Text("Page 2".to_string()))
    );

    engine.stop();
}

#[tokio::test]
async fn test_unsupported_content_type_is_rejected() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/document.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46])
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;

    let (engine, _sink) = engine_with(fast_config());
    let mut stream = engine.start().unwrap();
    engine
        .submit(request(&format!("{}/document.pdf", server.uri())))
        .await
        .unwrap();

    let result = stream.next().await.unwrap();
    assert_eq!(result.status, CrawlStatus::UnsupportedContentType);
    assert!(result.page.is_none());

    engine.stop();
}

#[tokio::test]
async fn test_same_host_politeness_gap() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    for route in ["/one", "/two"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><p>ok</p></html>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;
    }

    // One worker, one-second politeness floor.
    let config = EngineConfig {
        max_concurrency: 1,
        queue_capacity: 16,
        result_buffer_size: 16,
        default_delay_ms: 1000,
        ..Default::default()
    };
    let (engine, _sink) = engine_with(config);
    let mut stream = engine.start().unwrap();

    engine
        .submit(request(&format!("{}/one", server.uri())))
        .await
        .unwrap();
    engine
        .submit(request(&format!("{}/two", server.uri())))
        .await
        .unwrap();

    let first = stream.next().await.unwrap();
    let first_done = Instant::now();
    assert_eq!(first.status, CrawlStatus::Success);

    let second = stream.next().await.unwrap();
    let gap = first_done.elapsed();
    assert_eq!(second.status, CrawlStatus::Success);
    assert!(
        gap >= Duration::from_millis(900),
        "expected >=900ms politeness gap, got {:?}",
        gap
    );

    engine.stop();
}

#[tokio::test]
async fn test_redirects_follow_per_request_policy() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/new"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><h1>Moved here</h1></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let (engine, _sink) = engine_with(fast_config());
    let mut stream = engine.start().unwrap();

    // With redirects enabled the crawl lands on the target page.
    engine
        .submit(request(&format!("{}/old", server.uri())))
        .await
        .unwrap();
    let followed = stream.next().await.unwrap();
    assert_eq!(followed.status, CrawlStatus::Success);
    assert!(followed.page.unwrap().url.ends_with("/new"));

    // With redirects disabled on the request's own policy, the 301 itself
    // is the terminal response.
    let mut no_follow = request(&format!("{}/old?nofollow=1", server.uri()));
    no_follow.policy.follow_redirects = false;
    engine.submit(no_follow).await.unwrap();
    let stopped = stream.next().await.unwrap();
    assert_eq!(stopped.status, CrawlStatus::Failed);
    assert_eq!(stopped.error.as_deref(), Some("HTTP 301"));

    engine.stop();
}

#[tokio::test]
async fn test_http_error_maps_to_failed() {
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let (engine, _sink) = engine_with(fast_config());
    let mut stream = engine.start().unwrap();
    engine
        .submit(request(&format!("{}/broken", server.uri())))
        .await
        .unwrap();

    let result = stream.next().await.unwrap();
    assert_eq!(result.status, CrawlStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("HTTP 500"));

    engine.stop();
}
