//! Observability infrastructure for the snapshotter
//!
//! Provides:
//! - Prometheus metrics (cycle latency, records written, collector errors, toggle state)
//! - Structured logging of lifecycle and cycle events with tracing

use crate::collector::{CollectorFailure, CycleReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle duration (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SnapshotMetricsInner> = OnceLock::new();

struct SnapshotMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounter,
    cycles_skipped_total: IntCounter,
    records_written_total: IntCounterVec,
    fetch_errors_total: IntCounterVec,
    collector_aborts_total: IntCounterVec,
    write_errors_total: IntCounterVec,
    collection_active: IntGauge,
    control_plane_reachable: IntGauge,
}

impl SnapshotMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "kube_snapshot_cycle_duration_seconds",
                "Wall-clock time of one collection cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter!(
                "kube_snapshot_cycles_total",
                "Collection cycles executed"
            )
            .expect("Failed to register cycles_total"),

            cycles_skipped_total: register_int_counter!(
                "kube_snapshot_cycles_skipped_total",
                "Scheduled cycles skipped because collection was switched off"
            )
            .expect("Failed to register cycles_skipped_total"),

            records_written_total: register_int_counter_vec!(
                "kube_snapshot_records_written_total",
                "Summary records written to the store",
                &["kind"]
            )
            .expect("Failed to register records_written_total"),

            fetch_errors_total: register_int_counter_vec!(
                "kube_snapshot_fetch_errors_total",
                "Resource list fetches that failed or could not be decoded",
                &["kind"]
            )
            .expect("Failed to register fetch_errors_total"),

            collector_aborts_total: register_int_counter_vec!(
                "kube_snapshot_collector_aborts_total",
                "Collector tasks that panicked or were cancelled before reporting",
                &["kind"]
            )
            .expect("Failed to register collector_aborts_total"),

            write_errors_total: register_int_counter_vec!(
                "kube_snapshot_write_errors_total",
                "Records that could not be written to the store",
                &["kind"]
            )
            .expect("Failed to register write_errors_total"),

            collection_active: register_int_gauge!(
                "kube_snapshot_collection_active",
                "1 while the collection loop is switched on"
            )
            .expect("Failed to register collection_active"),

            control_plane_reachable: register_int_gauge!(
                "kube_snapshot_control_plane_reachable",
                "Result of the startup control-plane reachability probe"
            )
            .expect("Failed to register control_plane_reachable"),
        }
    }
}

impl SnapshotMetricsInner {
    fn failure_counter(&self, failure: &CollectorFailure) -> &IntCounterVec {
        match failure {
            CollectorFailure::Fetch(_) => &self.fetch_errors_total,
            CollectorFailure::Aborted(_) => &self.collector_aborts_total,
        }
    }
}

/// Lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct SnapshotMetrics {
    _private: (),
}

impl Default for SnapshotMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SnapshotMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SnapshotMetricsInner {
        GLOBAL_METRICS.get_or_init(SnapshotMetricsInner::new)
    }

    /// Fold a finished cycle into the counters
    pub fn observe_cycle(&self, report: &CycleReport) {
        let inner = self.inner();
        inner.cycles_total.inc();
        inner
            .cycle_duration_seconds
            .observe(report.elapsed.as_secs_f64());

        for collector in &report.collectors {
            let kind = collector.kind.as_str();
            inner
                .records_written_total
                .with_label_values(&[kind])
                .inc_by(collector.written as u64);
            inner
                .write_errors_total
                .with_label_values(&[kind])
                .inc_by(collector.failed_writes as u64);
            if let Some(failure) = &collector.failure {
                inner.failure_counter(failure).with_label_values(&[kind]).inc();
            }
        }
    }

    /// Count a tick skipped while collection was off
    pub fn inc_cycles_skipped(&self) {
        self.inner().cycles_skipped_total.inc();
    }

    pub fn set_collection_active(&self, active: bool) {
        self.inner().collection_active.set(i64::from(active));
    }

    pub fn set_control_plane_reachable(&self, reachable: bool) {
        self.inner().control_plane_reachable.set(i64::from(reachable));
    }
}

/// Structured logger for snapshotter events
#[derive(Clone)]
pub struct StructuredLogger {
    control_plane: String,
}

impl StructuredLogger {
    pub fn new(control_plane: impl Into<String>) -> Self {
        Self {
            control_plane: control_plane.into(),
        }
    }

    /// Log startup with the probe result
    pub fn log_startup(&self, version: &str, reachable: bool) {
        info!(
            event = "snapshotter_started",
            control_plane = %self.control_plane,
            version = %version,
            control_plane_reachable = reachable,
            "Kube snapshotter started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "snapshotter_shutdown",
            control_plane = %self.control_plane,
            reason = %reason,
            "Kube snapshotter shutting down"
        );
    }

    /// Log a `POST /status/{value}` state change
    pub fn log_toggle(&self, active: bool, value: &str) {
        info!(
            event = "collection_toggled",
            active = active,
            value = %value,
            "Collection switched {}",
            if active { "on" } else { "off" }
        );
    }

    /// One line per cycle, plus one warning per failed collector
    pub fn log_cycle(&self, report: &CycleReport) {
        for collector in &report.collectors {
            match &collector.failure {
                Some(CollectorFailure::Fetch(reason)) => warn!(
                    event = "collector_failed",
                    control_plane = %self.control_plane,
                    kind = %collector.kind,
                    reason = %reason,
                    "Resource fetch failed, no rows written"
                ),
                Some(CollectorFailure::Aborted(reason)) => warn!(
                    event = "collector_aborted",
                    control_plane = %self.control_plane,
                    kind = %collector.kind,
                    reason = %reason,
                    "Collector task aborted"
                ),
                None => {}
            }
        }

        if report.is_clean() {
            info!(
                event = "cycle_complete",
                fetched = report.fetched(),
                written = report.written(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Collection cycle complete"
            );
        } else {
            warn!(
                event = "cycle_complete",
                fetched = report.fetched(),
                written = report.written(),
                failed_writes = report.failed_writes(),
                failed_collectors = report.failed_collectors(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Collection cycle completed with failures"
            );
        }
    }
}
