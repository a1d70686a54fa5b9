use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

pub struct CacheMetrics {
    // Lookups
    fresh_hits: AtomicUsize,
    stale_hits: AtomicUsize,
    coalesced: AtomicUsize,
    skipped_disabled: AtomicUsize,

    // Fetches
    fetches_started: AtomicUsize,
    fetches_succeeded: AtomicUsize,
    fetches_failed: AtomicUsize,
    retries: AtomicUsize,

    // Timing (in microseconds)
    total_fetch_time_us: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fresh_hits: AtomicUsize::new(0),
            stale_hits: AtomicUsize::new(0),
            coalesced: AtomicUsize::new(0),
            skipped_disabled: AtomicUsize::new(0),
            fetches_started: AtomicUsize::new(0),
            fetches_succeeded: AtomicUsize::new(0),
            fetches_failed: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            total_fetch_time_us: AtomicU64::new(0),
        })
    }

    pub fn record_fresh_hit(&self) {
        self.fresh_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self, duration: std::time::Duration, success: bool) {
        self.total_fetch_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if success {
            self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fetches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.fetches_succeeded.load(Ordering::Relaxed);
        let failed = self.fetches_failed.load(Ordering::Relaxed);
        MetricsSnapshot {
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            skipped_disabled: self.skipped_disabled.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: succeeded,
            fetches_failed: failed,
            retries: self.retries.load(Ordering::Relaxed),
            avg_fetch_time_ms: avg_time_ms(&self.total_fetch_time_us, succeeded + failed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub fresh_hits: usize,
    pub stale_hits: usize,
    pub coalesced: usize,
    pub skipped_disabled: usize,
    pub fetches_started: usize,
    pub fetches_succeeded: usize,
    pub fetches_failed: usize,
    pub retries: usize,
    pub avg_fetch_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
