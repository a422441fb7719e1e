//! Nullable consensus sink: collect decided rounds.

use parking_lot::Mutex;
use weft_types::{ConsensusRecord, ConsensusRound, ConsensusSink};

#[derive(Default)]
pub struct RecordingSink {
    rounds: Mutex<Vec<ConsensusRound>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> Vec<ConsensusRound> {
        self.rounds.lock().clone()
    }

    /// Every record received so far, in delivery order.
    pub fn records(&self) -> Vec<ConsensusRecord> {
        self.rounds
            .lock()
            .iter()
            .flat_map(|round| round.records.iter().cloned())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.rounds.lock().iter().map(|r| r.records.len()).sum()
    }
}

impl ConsensusSink for RecordingSink {
    fn on_consensus_round(&self, round: &ConsensusRound) {
        self.rounds.lock().push(round.clone());
    }
}
