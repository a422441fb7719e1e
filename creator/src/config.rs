use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rules::CreationRule;

/// Event creation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreationConfig {
    /// Maximum events per second this node creates (0 = unlimited).
    #[serde(default = "default_max_creation_rate")]
    pub max_creation_rate: f64,

    /// With no pending transactions, create at most one event per interval (ms).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// How often the platform asks the creator to try (ms).
    #[serde(default = "default_creation_period_ms")]
    pub creation_period_ms: u64,

    /// Upper bound on the transaction bytes bundled into one event.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Pipeline backlog above which this node stops creating.
    #[serde(default = "default_overload_backlog")]
    pub overload_backlog: usize,
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_max_creation_rate() -> f64 {
    20.0
}

fn default_heartbeat_interval_ms() -> u64 {
    1_000
}

fn default_creation_period_ms() -> u64 {
    10
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_overload_backlog() -> usize {
    5_000
}

impl CreationConfig {
    /// Shortest allowed gap between two created events, `None` when unlimited.
    pub fn min_creation_period(&self) -> Option<Duration> {
        if self.max_creation_rate > 0.0 && self.max_creation_rate.is_finite() {
            Some(Duration::from_secs_f64(1.0 / self.max_creation_rate))
        } else {
            None
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn creation_period(&self) -> Duration {
        Duration::from_millis(self.creation_period_ms.max(1))
    }

    /// The default rule list: platform status, pipeline health, overload,
    /// rate limit, parent availability, heartbeat.
    pub fn rules(&self) -> Vec<CreationRule> {
        let mut rules = vec![
            CreationRule::PlatformStatus,
            CreationRule::PipelineHealth,
            CreationRule::Overload {
                max_backlog: self.overload_backlog,
            },
        ];
        if let Some(min_period) = self.min_creation_period() {
            rules.push(CreationRule::RateLimit { min_period });
        }
        rules.push(CreationRule::ParentAvailability);
        rules.push(CreationRule::Heartbeat {
            interval: self.heartbeat_interval(),
        });
        rules
    }
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            max_creation_rate: default_max_creation_rate(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            creation_period_ms: default_creation_period_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            overload_backlog: default_overload_backlog(),
        }
    }
}
