//! Backlog sampling and the scheduler's healthy/unhealthy flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::HealthConfig;
use crate::wire::{ConcurrencyMode, WireStats};

struct Tracked {
    stats: Arc<WireStats>,
    over_since: Option<Instant>,
}

/// Samples every registered wire and decides whether the scheduler is healthy.
pub struct HealthMonitor {
    config: HealthConfig,
    wires: Mutex<Vec<Tracked>>,
    healthy: AtomicBool,
}

/// Point-in-time view of one wire.
#[derive(Clone, Debug, Serialize)]
pub struct WireSnapshot {
    pub name: String,
    pub mode: ConcurrencyMode,
    pub capacity: usize,
    pub backlog: usize,
    pub occupancy: f64,
    pub squelched: bool,
    pub handled: u64,
    pub discarded: u64,
    pub failed: u64,
    /// How long the wire has been above the occupancy threshold, if it is.
    pub over_threshold_for: Option<Duration>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub wires: Vec<WireSnapshot>,
}

impl HealthReport {
    pub fn wire(&self, name: &str) -> Option<&WireSnapshot> {
        self.wires.iter().find(|w| w.name == name)
    }
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            wires: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub(crate) fn register(&self, stats: Arc<WireStats>) {
        self.wires.lock().push(Tracked {
            stats,
            over_since: None,
        });
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Take one backlog sample at `now` and update the health flag.
    pub fn sample(&self, now: Instant) -> bool {
        let threshold = self.config.occupancy_threshold;
        let unhealthy_after = self.config.unhealthy_after();
        let mut wires = self.wires.lock();
        let mut congested: Option<(String, f64)> = None;

        for tracked in wires.iter_mut() {
            let occupancy = tracked.stats.occupancy();
            if occupancy > threshold {
                let since = *tracked.over_since.get_or_insert(now);
                if now.saturating_duration_since(since) >= unhealthy_after && congested.is_none() {
                    congested = Some((tracked.stats.name().to_string(), occupancy));
                }
            } else {
                tracked.over_since = None;
            }
        }
        drop(wires);

        let healthy = congested.is_none();
        let was_healthy = self.healthy.swap(healthy, Ordering::SeqCst);
        match (was_healthy, congested) {
            (true, Some((wire, occupancy))) => {
                warn!(wire = %wire, occupancy, "scheduler unhealthy, wire backlog over threshold");
            }
            (false, None) => info!("scheduler healthy again"),
            _ => {}
        }
        healthy
    }

    pub fn report(&self, now: Instant) -> HealthReport {
        let wires = self
            .wires
            .lock()
            .iter()
            .map(|tracked| {
                let stats = &tracked.stats;
                WireSnapshot {
                    name: stats.name().to_string(),
                    mode: stats.mode(),
                    capacity: stats.capacity(),
                    backlog: stats.backlog(),
                    occupancy: stats.occupancy(),
                    squelched: stats.is_squelched(),
                    handled: stats.handled(),
                    discarded: stats.discarded(),
                    failed: stats.failed(),
                    over_threshold_for: tracked
                        .over_since
                        .map(|since| now.saturating_duration_since(since)),
                }
            })
            .collect();
        HealthReport {
            healthy: self.is_healthy(),
            wires,
        }
    }
}
