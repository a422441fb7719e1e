//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

/// Default per-wire capacity; large enough to absorb gossip bursts.
pub const DEFAULT_WIRE_CAPACITY: usize = 10_000;

/// Worker pool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WiringConfig {
    /// Number of worker threads shared by every wire.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Capacity used by wires that do not specify their own.
    #[serde(default = "default_capacity")]
    pub default_capacity: usize,
}

/// Health monitor configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Backlog/capacity ratio above which a wire counts as congested.
    #[serde(default = "default_occupancy_threshold")]
    pub occupancy_threshold: f64,

    /// How long a wire must stay congested before the model is unhealthy (ms).
    #[serde(default = "default_unhealthy_after_ms")]
    pub unhealthy_after_ms: u64,

    /// Interval between backlog samples (ms).
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
        .max(4)
}

fn default_capacity() -> usize {
    DEFAULT_WIRE_CAPACITY
}

fn default_occupancy_threshold() -> f64 {
    0.9
}

fn default_unhealthy_after_ms() -> u64 {
    1_000
}

fn default_sample_period_ms() -> u64 {
    100
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WiringConfig {
    /// Small pool for tests.
    pub fn minimal() -> Self {
        Self {
            worker_threads: 4,
            default_capacity: DEFAULT_WIRE_CAPACITY,
        }
    }
}

impl Default for WiringConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            default_capacity: default_capacity(),
        }
    }
}

impl HealthConfig {
    pub fn unhealthy_after(&self) -> Duration {
        Duration::from_millis(self.unhealthy_after_ms)
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms.max(1))
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            occupancy_threshold: default_occupancy_threshold(),
            unhealthy_after_ms: default_unhealthy_after_ms(),
            sample_period_ms: default_sample_period_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let wiring = WiringConfig::default();
        assert!(wiring.worker_threads >= 4);
        assert_eq!(wiring.default_capacity, DEFAULT_WIRE_CAPACITY);

        let health = HealthConfig::default();
        assert_eq!(health.unhealthy_after(), Duration::from_secs(1));
        assert_eq!(health.sample_period(), Duration::from_millis(100));
        assert!(health.occupancy_threshold > 0.0 && health.occupancy_threshold <= 1.0);
    }

    #[test]
    fn zero_sample_period_is_clamped() {
        let health = HealthConfig {
            sample_period_ms: 0,
            ..HealthConfig::default()
        };
        assert_eq!(health.sample_period(), Duration::from_millis(1));
    }
}
