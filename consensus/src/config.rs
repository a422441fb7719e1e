use serde::{Deserialize, Serialize};

/// Tunables of the virtual-voting algorithm.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Every n-th voting round (counted from the candidate's round) is a coin round.
    #[serde(default = "default_coin_round_frequency")]
    pub coin_round_frequency: u64,

    /// Number of decided rounds whose events stay non-ancient.
    #[serde(default = "default_rounds_non_ancient")]
    pub rounds_non_ancient: u64,

    /// Minimum gap between consecutive consensus timestamps (ns).
    #[serde(default = "default_min_timestamp_increment_nanos")]
    pub min_timestamp_increment_nanos: u64,
}

fn default_coin_round_frequency() -> u64 {
    12
}

fn default_rounds_non_ancient() -> u64 {
    26
}

fn default_min_timestamp_increment_nanos() -> u64 {
    1_000
}

impl ConsensusConfig {
    /// Coin frequency clamped so that the first voting round is never a coin round.
    pub fn effective_coin_frequency(&self) -> u64 {
        self.coin_round_frequency.max(2)
    }

    pub fn effective_rounds_non_ancient(&self) -> u64 {
        self.rounds_non_ancient.max(1)
    }

    pub fn effective_min_increment(&self) -> u64 {
        self.min_timestamp_increment_nanos.max(1)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            coin_round_frequency: default_coin_round_frequency(),
            rounds_non_ancient: default_rounds_non_ancient(),
            min_timestamp_increment_nanos: default_min_timestamp_increment_nanos(),
        }
    }
}
