//! Batch crawl
//!
//! A self-contained crawl run that does not touch the engine's lifecycle:
//! it owns an unbounded request channel, a bounded result channel, and its
//! own worker pool, and completes exactly when every input request and
//! every transitively discovered child has produced a result. The page
//! pipeline and rate limiter are shared with the engine so deduplication
//! and politeness stay coherent across entry points.

use crate::engine::CrawlEngine;
use crate::model::{CrawlRequest, CrawlResult};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};

/// Capacity of a batch run's result channel
const BATCH_RESULT_BUFFER: usize = 1000;

/// Completions between progress log lines
const BATCH_PROGRESS_EVERY: usize = 100;

/// Tracks outstanding work for one batch run
///
/// `pending` counts requests queued but not yet completed; when it reaches
/// zero the closer drops the request sender and the run winds down.
struct BatchProgress {
    batch_id: String,
    pending: AtomicUsize,
    completed: AtomicUsize,
    done: Notify,
}

impl BatchProgress {
    fn new(batch_id: String, initial: usize) -> Self {
        Self {
            batch_id,
            pending: AtomicUsize::new(initial),
            completed: AtomicUsize::new(0),
            done: Notify::new(),
        }
    }

    fn queued(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn complete_one(&self) {
        let finished = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if finished % BATCH_PROGRESS_EVERY == 0 {
            tracing::info!("Batch {}: {} requests completed", self.batch_id, finished);
        }
        // notify_one stores a permit, so the closer cannot miss the final
        // transition even if it is not waiting yet.
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.done.notify_one();
        }
    }
}

impl CrawlEngine {
    /// Runs a standalone crawl over the given requests
    ///
    /// Independent of [`CrawlEngine::start`]: the batch spawns its own
    /// workers and channels, re-injects children on success, and closes
    /// the returned stream exactly when all input and transitively
    /// discovered requests have completed.
    ///
    /// # Arguments
    ///
    /// * `requests` - The seed requests for this run
    /// * `max_concurrency` - Worker count for this run
    /// * `batch_id` - Identifier used in progress logs
    pub fn batch_crawl(
        &self,
        requests: Vec<CrawlRequest>,
        max_concurrency: usize,
        batch_id: impl Into<String>,
    ) -> ReceiverStream<CrawlResult> {
        let batch_id = batch_id.into();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::channel(BATCH_RESULT_BUFFER);

        let progress = Arc::new(BatchProgress::new(batch_id.clone(), requests.len()));
        tracing::info!(
            "Batch {} starting: {} seed requests, {} workers",
            batch_id,
            requests.len(),
            max_concurrency
        );

        for request in requests {
            // Unbounded send only fails when the receiver is gone.
            let _ = request_tx.send(request);
        }
        let child_tx = request_tx.downgrade();

        // The closer holds the only strong sender; when pending hits zero
        // it drops it, the stream ends, and the workers wind down.
        {
            let progress = progress.clone();
            tokio::spawn(async move {
                while progress.pending.load(Ordering::SeqCst) > 0 {
                    progress.done.notified().await;
                }
                drop(request_tx);
            });
        }

        let pipeline = self.pipeline.clone();
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            UnboundedReceiverStream::new(request_rx)
                .for_each_concurrent(max_concurrency.max(1), |request| {
                    let pipeline = pipeline.clone();
                    let limiter = limiter.clone();
                    let progress = progress.clone();
                    let child_tx = child_tx.clone();
                    let result_tx = result_tx.clone();

                    async move {
                        // The consumer dropping the stream cancels the rest
                        // of the run; remaining requests drain unprocessed.
                        if result_tx.is_closed() {
                            progress.complete_one();
                            return;
                        }

                        limiter
                            .wait_for(
                                &request.url,
                                &request.policy.user_agent,
                                request.policy.delay_ms,
                            )
                            .await;

                        let result = super::run_pipeline(&pipeline, request).await;

                        if result.status.is_success() {
                            if let Some(tx) = child_tx.upgrade() {
                                for child in &result.new_requests {
                                    progress.queued();
                                    if tx.send(child.clone()).is_err() {
                                        progress.complete_one();
                                    }
                                }
                            }
                        }

                        if result_tx.send(result).await.is_err() {
                            tracing::debug!("Batch result consumer gone, discarding result");
                        }
                        progress.complete_one();
                    }
                })
                .await;

            tracing::info!(
                "Batch {} finished: {} requests completed",
                progress.batch_id,
                progress.completed.load(Ordering::SeqCst)
            );
        });

        ReceiverStream::new(result_rx)
    }
}
