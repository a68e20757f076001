//! Pipeline telemetry for observability.
//!
//! Lock-free atomic counters updated by receivers and the processing loop,
//! with point-in-time snapshots for logging and status output.
//!
//! # Architecture
//!
//! ```text
//! Receivers ──────┐
//!                 ├──► PipelineMetrics ─────► TelemetrySnapshot ─────► Views
//! Processing Loop ┘    (atomic counters)     (point-in-time copy)     (CLI log)
//! ```
//!
//! # Example
//!
//! ```
//! use connmap::telemetry::PipelineMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(PipelineMetrics::new());
//! metrics.datagram_received();
//! metrics.open_applied();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.datagrams_received, 1);
//! assert_eq!(snapshot.opens_applied, 1);
//! ```

mod snapshot;

pub use snapshot::TelemetrySnapshot;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Shared counters for the whole ingestion pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    started_at: Instant,
    datagrams_received: AtomicU64,
    datagrams_dropped: AtomicU64,
    lines_processed: AtomicU64,
    lines_ignored: AtomicU64,
    opens_applied: AtomicU64,
    closes_applied: AtomicU64,
    closes_unmatched: AtomicU64,
    geo_not_found: AtomicU64,
    geo_errors: AtomicU64,
    invalid_coordinates: AtomicU64,
    receivers_failed: AtomicU64,
    processor_running: AtomicBool,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create zeroed counters; uptime starts now.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            datagrams_received: AtomicU64::new(0),
            datagrams_dropped: AtomicU64::new(0),
            lines_processed: AtomicU64::new(0),
            lines_ignored: AtomicU64::new(0),
            opens_applied: AtomicU64::new(0),
            closes_applied: AtomicU64::new(0),
            closes_unmatched: AtomicU64::new(0),
            geo_not_found: AtomicU64::new(0),
            geo_errors: AtomicU64::new(0),
            invalid_coordinates: AtomicU64::new(0),
            receivers_failed: AtomicU64::new(0),
            processor_running: AtomicBool::new(false),
        }
    }

    // Receiver side

    pub fn datagram_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A datagram arrived after the processing loop shut down.
    pub fn datagram_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn receiver_failed(&self) {
        self.receivers_failed.fetch_add(1, Ordering::Relaxed);
    }

    // Processing side

    pub fn line_processed(&self) {
        self.lines_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn line_ignored(&self) {
        self.lines_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn open_applied(&self) {
        self.opens_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn close_applied(&self) {
        self.closes_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// A close whose cell had no open connections.
    pub fn close_unmatched(&self) {
        self.closes_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn geo_not_found(&self) {
        self.geo_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn geo_error(&self) {
        self.geo_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalid_coordinate(&self) {
        self.invalid_coordinates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record whether the processing loop is alive.
    pub fn set_processor_running(&self, running: bool) {
        self.processor_running.store(running, Ordering::SeqCst);
    }

    /// Lines fully handled by the processing loop so far.
    pub fn lines_processed(&self) -> u64 {
        self.lines_processed.load(Ordering::Relaxed)
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.started_at.elapsed(),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            lines_processed: self.lines_processed.load(Ordering::Relaxed),
            lines_ignored: self.lines_ignored.load(Ordering::Relaxed),
            opens_applied: self.opens_applied.load(Ordering::Relaxed),
            closes_applied: self.closes_applied.load(Ordering::Relaxed),
            closes_unmatched: self.closes_unmatched.load(Ordering::Relaxed),
            geo_not_found: self.geo_not_found.load(Ordering::Relaxed),
            geo_errors: self.geo_errors.load(Ordering::Relaxed),
            invalid_coordinates: self.invalid_coordinates.load(Ordering::Relaxed),
            receivers_failed: self.receivers_failed.load(Ordering::Relaxed),
            processor_running: self.processor_running.load(Ordering::SeqCst),
        }
    }
}
