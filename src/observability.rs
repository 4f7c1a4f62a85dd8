use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Workflow activity counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub intakes: AtomicU64,
    pub duplicates_rejected: AtomicU64,
    pub marked_ready: AtomicU64,
    pub delivered: AtomicU64,
    pub store_faults: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notification_failures: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_intake(&self) {
        self.intakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marked_ready(&self) {
        self.marked_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_fault(&self) {
        self.store_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self, ok: bool) {
        if ok {
            self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notification_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            intakes: self.intakes.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            marked_ready: self.marked_ready.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            store_faults: self.store_faults.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            intakes = stats.intakes,
            duplicates_rejected = stats.duplicates_rejected,
            marked_ready = stats.marked_ready,
            delivered = stats.delivered,
            store_faults = stats.store_faults,
            notifications_sent = stats.notifications_sent,
            notification_failures = stats.notification_failures,
            "Workflow metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowStats {
    pub intakes: u64,
    pub duplicates_rejected: u64,
    pub marked_ready: u64,
    pub delivered: u64,
    pub store_faults: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self, success: bool) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            success,
            "Operation completed"
        );
    }
}
