//! Operation counters reported by graph statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Query counters, safe to bump from concurrent readers.
#[derive(Debug, Default)]
pub struct OperationMetrics {
    search_operations: AtomicU64,
    path_finding_operations: AtomicU64,
    community_detection_operations: AtomicU64,
}

/// Point-in-time copy of [`OperationMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Neighborhood searches run.
    pub search_operations: u64,
    /// Shortest-path queries run.
    pub path_finding_operations: u64,
    /// Community detection runs, any method.
    pub community_detection_operations: u64,
}

impl OperationMetrics {
    /// Counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_search(&self) {
        self.search_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_path_finding(&self) {
        self.path_finding_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_community_detection(&self) {
        self.community_detection_operations
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            search_operations: self.search_operations.load(Ordering::Relaxed),
            path_finding_operations: self.path_finding_operations.load(Ordering::Relaxed),
            community_detection_operations: self
                .community_detection_operations
                .load(Ordering::Relaxed),
        }
    }
}
