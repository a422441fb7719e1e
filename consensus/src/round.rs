//! Per-round bookkeeping: witnesses and the round's position in its lifecycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_types::CreatorId;

use crate::arena::NodeIndex;

/// Lifecycle of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    /// Witnesses are arriving; no later-round witness has voted yet.
    CollectingWitnesses,
    /// Witnesses of the next round exist, so fame votes are being cast.
    Voting,
    /// Fame of every witness is decided and the round's events are ordered.
    Decided,
}

struct RoundInfo {
    /// Sorted by creator so every node iterates witnesses in the same order.
    witnesses: Vec<(CreatorId, NodeIndex)>,
    state: RoundState,
}

#[derive(Default)]
pub(crate) struct Rounds {
    rounds: BTreeMap<u64, RoundInfo>,
}

impl Rounds {
    pub fn add_witness(&mut self, round: u64, creator: CreatorId, index: NodeIndex) {
        let info = self.rounds.entry(round).or_insert_with(|| RoundInfo {
            witnesses: Vec::new(),
            state: RoundState::CollectingWitnesses,
        });
        let position = info
            .witnesses
            .partition_point(|(c, i)| (*c, *i) < (creator, index));
        info.witnesses.insert(position, (creator, index));
    }

    pub fn witnesses(&self, round: u64) -> Vec<NodeIndex> {
        self.rounds
            .get(&round)
            .map(|info| info.witnesses.iter().map(|(_, index)| *index).collect())
            .unwrap_or_default()
    }

    /// Round numbers from `start` upwards, ascending.
    pub fn numbers_from(&self, start: u64) -> Vec<u64> {
        self.rounds.range(start..).map(|(round, _)| *round).collect()
    }

    pub fn state(&self, round: u64) -> Option<RoundState> {
        self.rounds.get(&round).map(|info| info.state)
    }

    pub fn mark_voting(&mut self, round: u64) {
        if let Some(info) = self.rounds.get_mut(&round) {
            if info.state == RoundState::CollectingWitnesses {
                info.state = RoundState::Voting;
            }
        }
    }

    pub fn mark_decided(&mut self, round: u64) {
        if let Some(info) = self.rounds.get_mut(&round) {
            info.state = RoundState::Decided;
        }
    }

    pub fn max_round(&self) -> u64 {
        self.rounds.keys().next_back().copied().unwrap_or(0)
    }

    pub fn oldest_round(&self) -> Option<u64> {
        self.rounds.keys().next().copied()
    }

    /// Drop bookkeeping for every round below `round`.
    pub fn remove_below(&mut self, round: u64) {
        self.rounds = self.rounds.split_off(&round);
    }
}
