// ═══════════════════════════════════════════════════════════════
// METRICS COLLECTOR - Because if you can't measure it, it didn't happen
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters for runs, attempts, outcomes and chat deliveries.
// The poller bumps them as it goes and logs a JSON snapshot after every
// run, so a long-lived scheduled process leaves a running tally in its logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use serde::Serialize;

use crate::models::FetchOutcome;

/// The metrics snapshot - what gets serialized to JSON
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_exhausted: u64,
    pub attempts: u64,
    pub success_outcomes: u64,
    pub empty_outcomes: u64,
    pub scan_error_outcomes: u64,
    pub http_failures: u64,
    pub transport_exceptions: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub uptime_seconds: u64,
}

/// Thread-safe atomic metrics collector
pub struct MetricsCollector {
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_exhausted: AtomicU64,
    attempts: AtomicU64,
    success_outcomes: AtomicU64,
    empty_outcomes: AtomicU64,
    scan_error_outcomes: AtomicU64,
    http_failures: AtomicU64,
    transport_exceptions: AtomicU64,
    notifications_sent: AtomicU64,
    notification_failures: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_exhausted: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            success_outcomes: AtomicU64::new(0),
            empty_outcomes: AtomicU64::new(0),
            scan_error_outcomes: AtomicU64::new(0),
            http_failures: AtomicU64::new(0),
            transport_exceptions: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_succeeded(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_exhausted(&self) {
        self.runs_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &FetchOutcome) {
        let counter = match outcome {
            FetchOutcome::Success(_) => &self.success_outcomes,
            FetchOutcome::EmptyResult { .. } => &self.empty_outcomes,
            FetchOutcome::ScanError(_) => &self.scan_error_outcomes,
            FetchOutcome::HttpFailure(_) => &self.http_failures,
            FetchOutcome::TransportException(_) => &self.transport_exceptions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notification_failures(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all metrics (lock-free reads)
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_exhausted: self.runs_exhausted.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            success_outcomes: self.success_outcomes.load(Ordering::Relaxed),
            empty_outcomes: self.empty_outcomes.load(Ordering::Relaxed),
            scan_error_outcomes: self.scan_error_outcomes.load(Ordering::Relaxed),
            http_failures: self.http_failures.load(Ordering::Relaxed),
            transport_exceptions: self.transport_exceptions.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}
