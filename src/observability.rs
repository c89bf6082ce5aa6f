//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    items_succeeded: AtomicU64,
    items_failed: AtomicU64,
    batches_started: AtomicU64,
    batches_completed: AtomicU64,
    archives_built: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_succeeded(&self) {
        self.items_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_started(&self) {
        self.batches_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_started", "Metric incremented");
    }

    pub fn batch_completed(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_completed", "Metric incremented");
    }

    pub fn archive_built(&self) {
        self.archives_built.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "archives_built", "Metric incremented");
    }

    /// Record one finished run's item outcomes in bulk.
    pub fn record_summary(&self, succeeded: u64, failed: u64) {
        self.items_succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.items_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_succeeded: self.items_succeeded.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            batches_started: self.batches_started.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            archives_built: self.archives_built.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub batches_started: u64,
    pub batches_completed: u64,
    pub archives_built: u64,
}
