//! Crawl engine
//!
//! The engine owns the lifecycle: it accepts request submissions onto a
//! bounded queue, drains the queue through a pool of concurrent workers,
//! re-injects discovered child requests, and streams results to the caller.
//! Workers coordinate politeness through the per-domain rate limiter and
//! report into a shared statistics block.
//!
//! Lifecycle is `Idle → Running → Stopped`; a stopped engine is done, a new
//! crawl needs a new instance.

mod batch;
mod stats;

pub use stats::{EngineStats, EngineStatsSnapshot};

use crate::fetch::Fetcher;
use crate::limiter::DomainRateLimiter;
use crate::model::{CrawlMetrics, CrawlPolicy, CrawlRequest, CrawlResult, CrawlStatus};
use crate::pipeline::PagePipeline;
use crate::robots::RobotsService;
use crate::sink::ResultSink;
use crate::{CrawlerError, Result};
use futures_util::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent workers
    pub max_concurrency: usize,

    /// Capacity of the bounded request queue
    pub queue_capacity: usize,

    /// Capacity of the bounded result channel
    pub result_buffer_size: usize,

    /// How often the progress monitor wakes (milliseconds)
    pub progress_interval_ms: u64,

    /// Politeness delay used when robots.txt declares none (milliseconds)
    pub default_delay_ms: u64,

    /// Retry cap handed to the sink's retry drain
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 50,
            queue_capacity: 10_000,
            result_buffer_size: 1000,
            progress_interval_ms: 5000,
            default_delay_ms: 1000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Concurrent crawl engine
///
/// See the module docs for the moving parts. All state is owned by the
/// instance; nothing is global.
pub struct CrawlEngine {
    config: EngineConfig,
    pipeline: Arc<PagePipeline>,
    limiter: Arc<DomainRateLimiter>,
    sink: Arc<dyn ResultSink>,
    stats: Arc<EngineStats>,
    lifecycle: Mutex<Lifecycle>,
    request_tx: Mutex<Option<mpsc::Sender<CrawlRequest>>>,
    cancel: CancellationToken,
}

impl CrawlEngine {
    /// Creates an engine over the given fetcher and sink
    pub fn new(config: EngineConfig, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ResultSink>) -> Self {
        let robots = Arc::new(RobotsService::new(&CrawlPolicy::default().user_agent));
        let limiter = Arc::new(DomainRateLimiter::new(
            robots.clone(),
            config.default_delay_ms,
        ));
        let pipeline = Arc::new(PagePipeline::new(fetcher, sink.clone(), robots));

        Self {
            config,
            pipeline,
            limiter,
            sink,
            stats: Arc::new(EngineStats::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
            request_tx: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Drains failed requests whose retry backoff has elapsed
    ///
    /// Entries come from the sink recloned with an incremented retry
    /// counter, capped by the engine's `max_retries`. Submitting them again
    /// is the caller's decision.
    pub async fn failed_for_retry(&self) -> Vec<CrawlRequest> {
        self.sink.failed_for_retry(self.config.max_retries).await
    }

    /// Starts the engine and returns the result stream
    ///
    /// Spawns the worker pool and the progress monitor. Results arrive on
    /// the returned stream as requests complete, in no particular order;
    /// when the caller reads slowly the bounded result channel applies
    /// backpressure to the workers.
    ///
    /// # Errors
    ///
    /// * [`CrawlerError::AlreadyRunning`] - `start` was already called
    /// * [`CrawlerError::Stopped`] - the engine was stopped; build a new one
    pub fn start(&self) -> Result<ReceiverStream<CrawlResult>> {
        let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock poisoned");
        match *lifecycle {
            Lifecycle::Running => return Err(CrawlerError::AlreadyRunning),
            Lifecycle::Stopped => return Err(CrawlerError::Stopped),
            Lifecycle::Idle => {}
        }

        let (request_tx, request_rx) = mpsc::channel(self.config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(self.config.result_buffer_size);

        self.spawn_workers(request_rx, request_tx.downgrade(), result_tx);
        self.spawn_progress_monitor();

        *self.request_tx.lock().expect("request_tx lock poisoned") = Some(request_tx);
        *lifecycle = Lifecycle::Running;

        tracing::info!(
            "Engine started: {} workers, queue capacity {}",
            self.config.max_concurrency,
            self.config.queue_capacity
        );
        Ok(ReceiverStream::new(result_rx))
    }

    /// Enqueues one request
    ///
    /// Suspends while the queue is full (backpressure).
    ///
    /// # Errors
    ///
    /// * [`CrawlerError::NotRunning`] - the engine is not running
    pub async fn submit(&self, request: CrawlRequest) -> Result<()> {
        let tx = {
            let guard = self.request_tx.lock().expect("request_tx lock poisoned");
            guard.clone().ok_or(CrawlerError::NotRunning)?
        };
        tx.send(request)
            .await
            .map_err(|_| CrawlerError::NotRunning)?;
        self.stats.mark_enqueued();
        Ok(())
    }

    /// Enqueues a batch of requests, suspending as the queue fills
    pub async fn submit_many(&self, requests: Vec<CrawlRequest>) -> Result<()> {
        for request in requests {
            self.submit(request).await?;
        }
        Ok(())
    }

    /// Takes a statistics snapshot; cheap and safe to call concurrently
    pub fn stats(&self) -> EngineStatsSnapshot {
        let running = *self.lifecycle.lock().expect("lifecycle lock poisoned")
            == Lifecycle::Running;
        self.stats.snapshot(running)
    }

    /// Stops the engine
    ///
    /// Closes the request queue (no further submits are accepted), lets
    /// in-flight work finish, and closes the result channel. Queued
    /// requests that no worker has picked up are discarded.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().expect("lifecycle lock poisoned");
        if *lifecycle == Lifecycle::Stopped {
            return;
        }
        *lifecycle = Lifecycle::Stopped;
        self.request_tx
            .lock()
            .expect("request_tx lock poisoned")
            .take();
        self.cancel.cancel();
        tracing::info!("Engine stopped");
    }

    /// Spawns the dispatcher that drains the queue through the worker pool
    ///
    /// Workers hold only a weak sender for child re-injection, so dropping
    /// the engine's sender in [`CrawlEngine::stop`] closes the queue.
    fn spawn_workers(
        &self,
        request_rx: mpsc::Receiver<CrawlRequest>,
        child_tx: mpsc::WeakSender<CrawlRequest>,
        result_tx: mpsc::Sender<CrawlResult>,
    ) {
        let pipeline = self.pipeline.clone();
        let limiter = self.limiter.clone();
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let max_concurrency = self.config.max_concurrency;

        tokio::spawn(async move {
            let requests = ReceiverStream::new(request_rx).take_until(cancel.cancelled());
            requests
                .for_each_concurrent(max_concurrency, |request| {
                    let pipeline = pipeline.clone();
                    let limiter = limiter.clone();
                    let stats = stats.clone();
                    let child_tx = child_tx.clone();
                    let result_tx = result_tx.clone();

                    async move {
                        stats.mark_dequeued();
                        limiter
                            .wait_for(
                                &request.url,
                                &request.policy.user_agent,
                                request.policy.delay_ms,
                            )
                            .await;

                        let result = run_pipeline(&pipeline, request).await;
                        stats.record_completion(result.status.is_success());

                        let children = if result.status.is_success() {
                            result.new_requests.clone()
                        } else {
                            Vec::new()
                        };

                        if result_tx.send(result).await.is_err() {
                            tracing::debug!("Result consumer gone, discarding result");
                        }

                        // Children are offered non-blocking; a full queue
                        // drops them rather than deadlocking the worker.
                        if let Some(tx) = child_tx.upgrade() {
                            for child in children {
                                match tx.try_send(child) {
                                    Ok(()) => stats.mark_enqueued(),
                                    Err(mpsc::error::TrySendError::Full(child)) => {
                                        tracing::debug!(
                                            "Request queue full, dropping child {}",
                                            child.url
                                        );
                                    }
                                    Err(mpsc::error::TrySendError::Closed(_)) => {}
                                }
                            }
                        }
                    }
                })
                .await;

            tracing::debug!("Engine worker pool drained");
        });
    }

    /// Spawns the task that logs progress at each 1000-processed milestone
    fn spawn_progress_monitor(&self) {
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let interval_ms = self.config.progress_interval_ms;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_milestone = 0;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let snapshot = stats.snapshot(true);
                        let milestone = snapshot.processed / 1000;
                        if milestone > last_milestone {
                            last_milestone = milestone;
                            tracing::info!(
                                "Progress: {} processed ({} ok, {} failed), {:.1} rps, queue {}",
                                snapshot.processed,
                                snapshot.successes,
                                snapshot.failures,
                                snapshot.rps,
                                snapshot.queue_size
                            );
                        }
                    }
                }
            }
        });
    }
}

/// Runs the pipeline, converting a worker panic into a `FAILED` result
async fn run_pipeline(pipeline: &PagePipeline, request: CrawlRequest) -> CrawlResult {
    let fallback = request.clone();
    match AssertUnwindSafe(pipeline.execute(request)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            tracing::error!("Worker panicked while crawling {}: {}", fallback.url, message);
            CrawlResult::failure(
                fallback,
                CrawlStatus::Failed,
                message,
                CrawlMetrics::default(),
            )
        }
    }
}
