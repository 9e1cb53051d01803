//! Metrics collection for the delta-sync engine, using Prometheus,
//! optimized for minimal overhead on the hot apply/dispatch path.

use crate::core::error::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge, Registry,
};
use std::time::Instant;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Server-store metrics: delta throughput and apply latency.
pub struct StoreMetrics {
    /// Deltas successfully interpreted and applied to the authoritative model.
    pub deltas_applied: IntCounter,
    /// Refs registered into the id registry as a side effect of `Put`.
    pub refs_registered: IntCounter,
    /// Wall-clock time spent interpreting one delta, under the store lock.
    pub apply_duration: Histogram,
}

/// Per-connection dispatcher and transport metrics.
pub struct DispatcherMetrics {
    /// Connections currently registered as observers.
    pub active_connections: IntGauge,
    /// Outbound server messages encoded and sent.
    pub messages_sent: IntCounter,
    /// Inbound client commits decoded successfully.
    pub commits_accepted: IntCounter,
    /// Inbound frames rejected (decode failure or client id mismatch).
    pub commits_rejected: IntCounter,
}

/// Client-side reconciliation metrics.
pub struct ReconciliationMetrics {
    /// `Incremental` updates reconciled against the pending-delta queue.
    pub incrementals_reconciled: IntCounter,
    /// Reconciliation failures (base/updated model id mismatch, missing pending delta).
    pub reconciliation_errors: IntCounter,
    /// Current length of the pending-delta queue.
    pub pending_queue_depth: IntGauge,
}

/// Centralized metrics collection for the engine.
pub struct Metrics {
    /// Server store metrics.
    pub store: StoreMetrics,
    /// Dispatcher/transport metrics.
    pub dispatcher: DispatcherMetrics,
    /// Client reconciliation metrics.
    pub reconciliation: ReconciliationMetrics,
}

impl Metrics {
    /// Construct and register a fresh metrics instance.
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: StoreMetrics::new()?,
            dispatcher: DispatcherMetrics::new()?,
            reconciliation: ReconciliationMetrics::new()?,
        })
    }

    /// The process-wide metrics instance.
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> = Lazy::new(|| Metrics::new().expect("failed to initialize metrics"));
        &INSTANCE
    }
}

impl StoreMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            deltas_applied: register_int_counter!("dsync_deltas_applied_total", "Total deltas applied to the store")?,
            refs_registered: register_int_counter!(
                "dsync_refs_registered_total",
                "Total refs registered into the id registry"
            )?,
            apply_duration: register_histogram!(
                "dsync_apply_duration_seconds",
                "Time spent interpreting and applying one delta, under the store lock",
                vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]
            )?,
        })
    }
}

impl DispatcherMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            active_connections: register_int_gauge!("dsync_active_connections", "Number of connected observers")?,
            messages_sent: register_int_counter!("dsync_messages_sent_total", "Total outbound server messages sent")?,
            commits_accepted: register_int_counter!(
                "dsync_commits_accepted_total",
                "Total inbound commits accepted"
            )?,
            commits_rejected: register_int_counter!(
                "dsync_commits_rejected_total",
                "Total inbound frames rejected"
            )?,
        })
    }
}

impl ReconciliationMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            incrementals_reconciled: register_int_counter!(
                "dsync_incrementals_reconciled_total",
                "Total incremental updates reconciled on the client"
            )?,
            reconciliation_errors: register_int_counter!(
                "dsync_reconciliation_errors_total",
                "Total fatal reconciliation errors"
            )?,
            pending_queue_depth: register_int_gauge!(
                "dsync_pending_queue_depth",
                "Current length of the client's pending-delta queue"
            )?,
        })
    }
}

/// Measures one delta application and records it to a histogram on drop.
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start timing against `histogram`.
    pub fn start(histogram: Histogram) -> Self {
        Self { start: Instant::now(), histogram }
    }

    /// Record the elapsed time and consume the timer.
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Force initialization of the global metrics (and thus their registration
/// with the Prometheus registry) before the first scrape.
pub fn init_registry() {
    let _ = Metrics::global();
}

/// The process-wide Prometheus registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Render every registered metric in Prometheus text exposition format.
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let families = registry().gather();
    encoder.encode_to_string(&families).unwrap_or_default()
}
