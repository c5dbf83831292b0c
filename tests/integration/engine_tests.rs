//! Engine-level tests
//!
//! These tests exercise the scheduler and backpressure behaviour with an
//! in-process fetcher stub; a live HTTP double would only add latency.

use async_trait::async_trait;
use futures_util::StreamExt;
use inkcrawl::{
    CrawlEngine, CrawlRequest, CrawlStatus, EngineConfig, FetchResponse, Fetcher, MemorySink,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Answers every URL with a small static HTML page
struct StubFetcher;

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &CrawlRequest) -> FetchResponse {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        headers.insert("content-type".to_string(), vec!["text/html".to_string()]);
        FetchResponse {
            url: request.url.clone(),
            status_code: Some(200),
            body: Some("<html><p>ok</p></html>".to_string()),
            headers,
            is_successful: true,
            error: None,
            timed_out: false,
        }
    }
}

fn request(url: &str) -> CrawlRequest {
    let mut request = CrawlRequest::new(url);
    request.policy.respect_robots_txt = false;
    request.policy.delay_ms = 0;
    request
}

#[tokio::test]
async fn test_backpressure_with_small_queue_loses_nothing() {
    const TOTAL: usize = 10_000;

    let config = EngineConfig {
        max_concurrency: 20,
        queue_capacity: 100,
        result_buffer_size: 1000,
        default_delay_ms: 0,
        ..Default::default()
    };
    let engine = Arc::new(CrawlEngine::new(
        config,
        Arc::new(StubFetcher),
        Arc::new(MemorySink::new()),
    ));
    let stream = engine.start().unwrap();

    // Drain results concurrently so the submit side can make progress.
    let consumer = tokio::spawn(async move {
        stream
            .fold(0usize, |count, result| async move {
                assert_eq!(result.status, CrawlStatus::Success);
                count + 1
            })
            .await
    });

    // submit_many must suspend while the queue is full rather than failing
    // or dropping requests.
    let requests: Vec<CrawlRequest> = (0..TOTAL)
        .map(|i| request(&format!("http://127.0.0.1:1/page/{}", i)))
        .collect();
    engine.submit_many(requests).await.unwrap();

    // Wait until everything submitted has been processed.
    tokio::time::timeout(Duration::from_secs(60), async {
        while engine.stats().processed < TOTAL as u64 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("engine did not drain the queue in time");

    let snapshot = engine.stats();
    assert_eq!(snapshot.processed, TOTAL as u64);
    assert_eq!(snapshot.successes, TOTAL as u64);
    assert_eq!(snapshot.successes + snapshot.failures, snapshot.processed);

    engine.stop();
    let delivered = consumer.await.unwrap();
    assert_eq!(delivered, TOTAL);
}

#[tokio::test]
async fn test_exactly_one_result_per_request() {
    let config = EngineConfig {
        max_concurrency: 8,
        queue_capacity: 64,
        result_buffer_size: 64,
        default_delay_ms: 0,
        ..Default::default()
    };
    let engine = CrawlEngine::new(config, Arc::new(StubFetcher), Arc::new(MemorySink::new()));
    let mut stream = engine.start().unwrap();

    let urls: Vec<String> = (0..50)
        .map(|i| format!("http://127.0.0.1:1/item/{}", i))
        .collect();
    engine
        .submit_many(urls.iter().map(|u| request(u)).collect())
        .await
        .unwrap();

    let mut seen: HashMap<String, usize> = HashMap::new();
    for _ in 0..50 {
        let result = tokio::time::timeout(Duration::from_secs(30), stream.next())
            .await
            .expect("timed out waiting for results")
            .expect("stream closed early");
        *seen.entry(result.request.url.clone()).or_insert(0) += 1;
    }

    for url in &urls {
        assert_eq!(seen.get(url), Some(&1), "expected one result for {}", url);
    }

    engine.stop();
}

#[tokio::test]
async fn test_depth_limit_stops_discovery() {
    /// Serves an infinite link chain: /n links to /n+1
    struct ChainFetcher;

    #[async_trait]
    impl Fetcher for ChainFetcher {
        async fn fetch(&self, request: &CrawlRequest) -> FetchResponse {
            let n: u32 = request
                .url
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let mut headers: HashMap<String, Vec<String>> = HashMap::new();
            headers.insert("content-type".to_string(), vec!["text/html".to_string()]);
            FetchResponse {
                url: request.url.clone(),
                status_code: Some(200),
                body: Some(format!(r#"<a href="/{}">next</a>"#, n + 1)),
                headers,
                is_successful: true,
                error: None,
                timed_out: false,
            }
        }
    }

    let config = EngineConfig {
        max_concurrency: 2,
        queue_capacity: 64,
        result_buffer_size: 64,
        default_delay_ms: 0,
        ..Default::default()
    };
    let engine = CrawlEngine::new(config, Arc::new(ChainFetcher), Arc::new(MemorySink::new()));
    let mut stream = engine.start().unwrap();

    let mut seed = request("http://127.0.0.1:1/0");
    seed.max_depth = 3;
    engine.submit(seed).await.unwrap();

    // Depths 0..=3 crawl; the chain ends there.
    let mut depths = Vec::new();
    for _ in 0..4 {
        let result = tokio::time::timeout(Duration::from_secs(30), stream.next())
            .await
            .expect("timed out")
            .expect("stream closed early");
        assert_eq!(result.status, CrawlStatus::Success);
        depths.push(result.request.depth);

        // The invariant holds for every derived child.
        for child in &result.new_requests {
            assert_eq!(child.depth, result.request.depth + 1);
            assert!(child.depth <= child.max_depth);
        }
    }
    depths.sort();
    assert_eq!(depths, vec![0, 1, 2, 3]);

    // Nothing deeper arrives.
    let extra = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(extra.is_err(), "no request beyond max_depth should complete");

    engine.stop();
}
