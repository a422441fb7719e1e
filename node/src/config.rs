//! Platform configuration with TOML file support.

use std::path::Path;

use serde::{Deserialize, Serialize};
use weft_consensus::ConsensusConfig;
use weft_creator::CreationConfig;
use weft_intake::IntakeConfig;
use weft_txpool::TxPoolConfig;
use weft_wire::{HealthConfig, WiringConfig, DEFAULT_WIRE_CAPACITY};

use crate::logging::LogFormat;
use crate::PlatformError;

/// Configuration for a weft platform.
///
/// Can be loaded from a TOML file via [`PlatformConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so
/// an empty file is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub wiring: WiringSection,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub creation: CreationConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub txpool: TxPoolConfig,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool plus per-stage wire capacities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WiringSection {
    /// Number of worker threads shared by every wire.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Capacity of stages without an explicit entry in `capacities`.
    #[serde(default = "default_wire_capacity")]
    pub default_capacity: usize,

    #[serde(default)]
    pub capacities: StageCapacities,
}

/// Capacity of each pipeline stage. Unset stages use `default_capacity`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageCapacities {
    /// Pending creation triggers; heartbeat ticks are dropped when full.
    #[serde(default = "default_event_creation_capacity")]
    pub event_creation: usize,
    #[serde(default)]
    pub gossip: Option<usize>,
    #[serde(default)]
    pub intake: Option<usize>,
    #[serde(default)]
    pub consensus: Option<usize>,
    #[serde(default)]
    pub tipset: Option<usize>,
    #[serde(default)]
    pub consensus_output: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_worker_threads() -> usize {
    WiringConfig::default().worker_threads
}

fn default_wire_capacity() -> usize {
    DEFAULT_WIRE_CAPACITY
}

fn default_event_creation_capacity() -> usize {
    16
}

fn default_log_format() -> LogFormat {
    LogFormat::Human
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PlatformConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PlatformError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PlatformError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, PlatformError> {
        toml::from_str(s).map_err(|e| PlatformError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, PlatformError> {
        toml::to_string_pretty(self).map_err(|e| PlatformError::Config(e.to_string()))
    }
}

impl WiringSection {
    pub fn wiring_config(&self) -> WiringConfig {
        WiringConfig {
            worker_threads: self.worker_threads,
            default_capacity: self.default_capacity,
        }
    }

    pub fn capacity_of(&self, stage: Option<usize>) -> usize {
        stage.unwrap_or(self.default_capacity)
    }
}

impl Default for WiringSection {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            default_capacity: default_wire_capacity(),
            capacities: StageCapacities::default(),
        }
    }
}

impl Default for StageCapacities {
    fn default() -> Self {
        Self {
            event_creation: default_event_creation_capacity(),
            gossip: None,
            intake: None,
            consensus: None,
            tipset: None,
            consensus_output: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}
