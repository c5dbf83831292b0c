//! Live engine statistics
//!
//! Counters are atomics so workers update them without coordination; the
//! requests-per-second figure comes from a mutex-guarded sliding window of
//! completion timestamps (the last 1000 completions within 60 seconds,
//! whichever is tighter). Snapshots are cheap and safe to take from any
//! task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Maximum completions kept in the rps window
const RPS_WINDOW_COMPLETIONS: usize = 1000;

/// Maximum age of a completion kept in the rps window
const RPS_WINDOW_AGE: Duration = Duration::from_secs(60);

/// A point-in-time view of engine statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatsSnapshot {
    /// Whether the engine is currently running
    pub running: bool,
    /// Requests accepted (submissions plus re-injected children)
    pub total: u64,
    /// Requests completed
    pub processed: u64,
    /// Completions with `SUCCESS` status
    pub successes: u64,
    /// Completions with any other status
    pub failures: u64,
    /// Requests accepted but not yet pulled by a worker
    pub queue_size: u64,
    /// Completions per second over the sliding window
    pub rps: f64,
    /// Percentage of completions that succeeded
    pub success_rate: f64,
}

/// Shared mutable statistics block
#[derive(Default)]
pub struct EngineStats {
    total: AtomicU64,
    processed: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    queue_size: AtomicU64,
    window: Mutex<VecDeque<Instant>>,
}

impl EngineStats {
    /// Creates a zeroed statistics block
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request accepted into the queue
    pub fn mark_enqueued(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.queue_size.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request pulled off the queue by a worker
    pub fn mark_dequeued(&self) {
        // Saturating: a worker can race a fresh snapshot, never underflow.
        let _ = self
            .queue_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Records one completed request
    pub fn record_completion(&self, success: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        let now = Instant::now();
        let mut window = self.window.lock().expect("stats window lock poisoned");
        window.push_back(now);
        Self::prune(&mut window, now);
    }

    /// Takes a snapshot; `running` is supplied by the engine lifecycle
    pub fn snapshot(&self, running: bool) -> EngineStatsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);

        let rps = {
            let now = Instant::now();
            let mut window = self.window.lock().expect("stats window lock poisoned");
            Self::prune(&mut window, now);
            match window.front() {
                Some(oldest) => {
                    let span = now.duration_since(*oldest).as_secs_f64().max(1.0);
                    window.len() as f64 / span
                }
                None => 0.0,
            }
        };

        EngineStatsSnapshot {
            running,
            total: self.total.load(Ordering::Relaxed),
            processed,
            successes,
            failures: self.failures.load(Ordering::Relaxed),
            queue_size: self.queue_size.load(Ordering::Relaxed),
            rps,
            success_rate: if processed > 0 {
                successes as f64 / processed as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Drops window entries older than 60 s and beyond the 1000 cap
    fn prune(window: &mut VecDeque<Instant>, now: Instant) {
        while window.len() > RPS_WINDOW_COMPLETIONS {
            window.pop_front();
        }
        while let Some(front) = window.front() {
            if now.duration_since(*front) > RPS_WINDOW_AGE {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}
