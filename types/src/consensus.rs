//! Consensus output: order records and decided rounds.

use serde::{Deserialize, Serialize};

use crate::event::EventDescriptor;
use crate::time::Timestamp;

/// The final position of one event in the total order. Never revised once emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub event: EventDescriptor,
    /// Dense, gap-free order index starting at 0.
    pub order: u64,
    /// Strictly increasing across the whole order.
    pub timestamp: Timestamp,
    /// The round whose famous witnesses received this event.
    pub round_received: u64,
}

/// Everything produced when one round is decided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub round: u64,
    /// Events received in this round, in consensus order.
    pub records: Vec<ConsensusRecord>,
    /// Generation below which events are retired after this round.
    pub ancient_threshold: u64,
    /// Events retired without ever reaching consensus.
    pub stale: Vec<EventDescriptor>,
}

impl ConsensusRound {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
