//! Prometheus metrics for the platform.
//!
//! [`PlatformMetrics`] owns a dedicated [`Registry`]; exporting it is left
//! to the host.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_vec_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntGauge, IntGaugeVec, Opts, Registry,
};
use weft_wire::HealthReport;

/// Central collection of all platform-level Prometheus metrics.
pub struct PlatformMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Events created by this node.
    pub events_created: IntCounter,
    /// Events admitted by intake (own and received).
    pub events_admitted: IntCounter,
    /// Events rejected by intake validation.
    pub events_rejected: IntCounter,
    /// Events that reached consensus.
    pub consensus_events: IntCounter,
    /// Events retired without reaching consensus.
    pub stale_events: IntCounter,
    /// Rounds decided.
    pub rounds_decided: IntCounter,
    /// Transactions accepted into the pool.
    pub transactions_submitted: IntCounter,
    /// Transactions refused by the pool.
    pub transactions_rejected: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Events waiting in the orphan buffer.
    pub orphan_count: IntGauge,
    /// Backlog of each wire.
    pub wire_backlog: IntGaugeVec,
    /// Latest event creation status, as [`weft_creator::EventCreationStatus::code`].
    pub creation_status: IntGauge,
    /// 1 while the scheduler is healthy.
    pub healthy: IntGauge,
    /// Latest decided round.
    pub last_decided_round: IntGauge,
    /// Current ancient threshold.
    pub ancient_threshold: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Events ordered per decided round.
    pub round_size: Histogram,
}

impl PlatformMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let events_created = register_int_counter_with_registry!(
            Opts::new("weft_events_created_total", "Events created by this node"),
            registry
        )
        .expect("failed to register events_created counter");

        let events_admitted = register_int_counter_with_registry!(
            Opts::new("weft_events_admitted_total", "Events admitted by intake"),
            registry
        )
        .expect("failed to register events_admitted counter");

        let events_rejected = register_int_counter_with_registry!(
            Opts::new("weft_events_rejected_total", "Events rejected by intake"),
            registry
        )
        .expect("failed to register events_rejected counter");

        let consensus_events = register_int_counter_with_registry!(
            Opts::new(
                "weft_consensus_events_total",
                "Events that reached consensus"
            ),
            registry
        )
        .expect("failed to register consensus_events counter");

        let stale_events = register_int_counter_with_registry!(
            Opts::new(
                "weft_stale_events_total",
                "Events retired without reaching consensus"
            ),
            registry
        )
        .expect("failed to register stale_events counter");

        let rounds_decided = register_int_counter_with_registry!(
            Opts::new("weft_rounds_decided_total", "Rounds decided"),
            registry
        )
        .expect("failed to register rounds_decided counter");

        let transactions_submitted = register_int_counter_with_registry!(
            Opts::new(
                "weft_transactions_submitted_total",
                "Transactions accepted into the pool"
            ),
            registry
        )
        .expect("failed to register transactions_submitted counter");

        let transactions_rejected = register_int_counter_with_registry!(
            Opts::new(
                "weft_transactions_rejected_total",
                "Transactions refused by the pool"
            ),
            registry
        )
        .expect("failed to register transactions_rejected counter");

        // Gauges
        let orphan_count = register_int_gauge_with_registry!(
            Opts::new("weft_orphan_count", "Events waiting for missing parents"),
            registry
        )
        .expect("failed to register orphan_count gauge");

        let wire_backlog = register_int_gauge_vec_with_registry!(
            Opts::new("weft_wire_backlog", "Tasks accepted but not yet handled"),
            &["wire"],
            registry
        )
        .expect("failed to register wire_backlog gauge");

        let creation_status = register_int_gauge_with_registry!(
            Opts::new("weft_creation_status", "Latest event creation status code"),
            registry
        )
        .expect("failed to register creation_status gauge");

        let healthy = register_int_gauge_with_registry!(
            Opts::new("weft_healthy", "1 while the scheduler is healthy"),
            registry
        )
        .expect("failed to register healthy gauge");

        let last_decided_round = register_int_gauge_with_registry!(
            Opts::new("weft_last_decided_round", "Latest decided round"),
            registry
        )
        .expect("failed to register last_decided_round gauge");

        let ancient_threshold = register_int_gauge_with_registry!(
            Opts::new("weft_ancient_threshold", "Generation below which events are retired"),
            registry
        )
        .expect("failed to register ancient_threshold gauge");

        // Histograms – exponential buckets covering 1 → ~16k events.
        let round_size = register_histogram_with_registry!(
            HistogramOpts::new("weft_round_size", "Events ordered per decided round")
                .buckets(
                    prometheus::exponential_buckets(1.0, 2.0, 15)
                        .expect("bucket parameters are valid")
                ),
            registry
        )
        .expect("failed to register round_size histogram");

        Self {
            registry,
            events_created,
            events_admitted,
            events_rejected,
            consensus_events,
            stale_events,
            rounds_decided,
            transactions_submitted,
            transactions_rejected,
            orphan_count,
            wire_backlog,
            creation_status,
            healthy,
            last_decided_round,
            ancient_threshold,
            round_size,
        }
    }

    /// Copy wire backlogs and the health flag from a health report.
    pub fn observe_health(&self, report: &HealthReport) {
        self.healthy.set(i64::from(report.healthy));
        for wire in &report.wires {
            self.wire_backlog
                .with_label_values(&[wire.name.as_str()])
                .set(wire.backlog as i64);
        }
    }
}

impl Default for PlatformMetrics {
    fn default() -> Self {
        Self::new()
    }
}
