//! The consensus engine: rounds, fame, and the total order.
//!
//! Events must arrive in topological order (every non-ancient parent
//! already added). Each call to [`ConsensusEngine::add_event`] may decide
//! zero or more rounds; decided rounds are returned in ascending order and
//! never revised.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, error, info, trace};
use weft_types::{
    ConsensusRecord, ConsensusRound, Event, EventDescriptor, EventHash, Roster, Timestamp,
};

use crate::arena::{EventArena, NodeIndex};
use crate::config::ConsensusConfig;
use crate::error::{ConsensusError, FatalError};
use crate::ordering;
use crate::round::{RoundState, Rounds};
use crate::voting::FameElection;

pub struct ConsensusEngine {
    roster: Arc<Roster>,
    config: ConsensusConfig,
    arena: EventArena,
    rounds: Rounds,
    election: FameElection,
    unordered: BTreeSet<NodeIndex>,
    last_decided: u64,
    /// Minimum judge generation per decided round still inside the window.
    judge_generations: BTreeMap<u64, u64>,
    ancient_threshold: u64,
    next_order: u64,
    last_timestamp: Option<Timestamp>,
    /// Events that arrived already ancient; reported with the next decided round.
    pending_stale: Vec<EventDescriptor>,
    halted: Option<FatalError>,
}

impl ConsensusEngine {
    pub fn new(roster: Arc<Roster>, config: ConsensusConfig) -> Self {
        let members = roster.len();
        let election = FameElection::new(config.effective_coin_frequency());
        Self {
            roster,
            config,
            arena: EventArena::new(members),
            rounds: Rounds::default(),
            election,
            unordered: BTreeSet::new(),
            last_decided: 0,
            judge_generations: BTreeMap::new(),
            ancient_threshold: 0,
            next_order: 0,
            last_timestamp: None,
            pending_stale: Vec::new(),
            halted: None,
        }
    }

    /// Add an event whose non-ancient parents have all been added.
    ///
    /// Returns the rounds decided as a result, oldest first. A fatal error
    /// halts the engine: this and every later call fail.
    pub fn add_event(
        &mut self,
        event: Arc<Event>,
    ) -> Result<Vec<ConsensusRound>, ConsensusError> {
        if let Some(fatal) = &self.halted {
            return Err(ConsensusError::Halted(fatal.clone()));
        }

        let index = match self.insert(event) {
            Ok(Some(index)) => index,
            Ok(None) => return Ok(Vec::new()),
            Err(fatal) => {
                error!(
                    error = %fatal,
                    last_decided_round = self.last_decided,
                    "consensus halted"
                );
                self.halted = Some(fatal.clone());
                return Err(ConsensusError::Fatal(fatal));
            }
        };

        let is_witness = self.arena.get(index).is_some_and(|n| n.witness);
        if !is_witness {
            return Ok(Vec::new());
        }

        let decided = self.election.decide(
            &mut self.arena,
            &self.rounds,
            &self.roster,
            self.last_decided,
        );
        if decided.is_empty() {
            return Ok(Vec::new());
        }
        trace!(decided = decided.len(), "witness fame decided");
        Ok(self.finish_decided_rounds())
    }

    /// Place an event in the arena and assign its round. `None` means the
    /// event was a duplicate or already ancient.
    fn insert(&mut self, event: Arc<Event>) -> Result<Option<NodeIndex>, FatalError> {
        let descriptor = event.descriptor();

        if let Some(existing) = self.arena.index_of(&descriptor.hash) {
            let identical = self
                .arena
                .get(existing)
                .is_some_and(|node| **node.event() == *event);
            if identical {
                debug!(event = %descriptor, "duplicate event ignored");
                return Ok(None);
            }
            return Err(FatalError::ConflictingEvent {
                hash: descriptor.hash,
            });
        }
        if !self.roster.contains(descriptor.creator) {
            return Err(FatalError::UnknownCreator { event: descriptor });
        }
        if descriptor.generation < self.ancient_threshold {
            debug!(
                event = %descriptor,
                ancient_threshold = self.ancient_threshold,
                "ancient event marked stale"
            );
            self.pending_stale.push(descriptor);
            return Ok(None);
        }
        if let Some(existing) = self
            .arena
            .slot(descriptor.creator, descriptor.sequence)
            .and_then(|index| self.arena.get(index))
        {
            return Err(FatalError::ForkedCreator {
                event: descriptor,
                creator: descriptor.creator,
                existing: existing.hash(),
            });
        }

        let self_parent = self.resolve_parent(&descriptor, event.self_parent())?;
        let other_parent = self.resolve_parent(&descriptor, event.other_parent())?;
        let has_declared_parents = event.content().parents().next().is_some();

        let index = self
            .arena
            .insert(Arc::clone(&event), self_parent, other_parent);
        let round = self.compute_round(index, [self_parent, other_parent], has_declared_parents);
        let witness = match self_parent.and_then(|p| self.arena.get(p)) {
            Some(parent) => parent.round < round,
            None => true,
        };
        let late = witness && round <= self.last_decided;

        if let Some(node) = self.arena.get_mut(index) {
            node.round = round;
            node.witness = witness;
            if late {
                node.fame = Some(false);
            }
        }
        if witness {
            self.rounds.add_witness(round, descriptor.creator, index);
            if round > 1 {
                self.rounds.mark_voting(round - 1);
            }
            if late {
                debug!(event = %descriptor, round, "late witness is not famous");
            }
        }
        self.unordered.insert(index);
        trace!(event = %descriptor, round, witness, "event added");
        Ok(Some(index))
    }

    fn resolve_parent(
        &self,
        event: &EventDescriptor,
        parent: Option<&EventDescriptor>,
    ) -> Result<Option<NodeIndex>, FatalError> {
        let Some(parent) = parent else {
            return Ok(None);
        };
        match self.arena.index_of(&parent.hash) {
            Some(index) => Ok(Some(index)),
            None if parent.generation < self.ancient_threshold => Ok(None),
            None => Err(FatalError::MissingParent {
                event: *event,
                parent: *parent,
            }),
        }
    }

    fn compute_round(
        &self,
        index: NodeIndex,
        parents: [Option<NodeIndex>; 2],
        has_declared_parents: bool,
    ) -> u64 {
        let parent_round = parents
            .into_iter()
            .flatten()
            .filter_map(|p| self.arena.get(p))
            .map(|node| node.round)
            .max();

        let Some(round) = parent_round else {
            if !has_declared_parents {
                return 1;
            }
            // Every parent is ancient: start at the oldest round still tracked.
            return self
                .rounds
                .oldest_round()
                .unwrap_or(self.last_decided + 1)
                .max(1);
        };

        let stake = self
            .rounds
            .witnesses(round)
            .into_iter()
            .filter(|witness| self.arena.strongly_sees(index, *witness, &self.roster))
            .filter_map(|witness| self.arena.get(witness))
            .fold(0u64, |acc, node| {
                acc.saturating_add(self.roster.stake_of(node.creator()))
            });
        if self.roster.is_supermajority(stake) {
            round + 1
        } else {
            round
        }
    }

    fn finish_decided_rounds(&mut self) -> Vec<ConsensusRound> {
        let mut decided = Vec::new();
        loop {
            let round = self.last_decided + 1;
            let witnesses = self.rounds.witnesses(round);
            if witnesses.is_empty() {
                break;
            }
            let undecided = witnesses
                .iter()
                .any(|w| self.arena.get(*w).is_some_and(|n| n.fame.is_none()));
            if undecided {
                break;
            }
            decided.push(self.finish_round(round, &witnesses));
        }
        decided
    }

    fn finish_round(&mut self, round: u64, witnesses: &[NodeIndex]) -> ConsensusRound {
        let judges: Vec<NodeIndex> = witnesses
            .iter()
            .copied()
            .filter(|w| self.arena.get(*w).is_some_and(|n| n.fame == Some(true)))
            .collect();

        let received = ordering::received_events(&self.arena, &self.unordered, &judges);
        let sorted = ordering::sort_received(&self.arena, &received, &judges);
        let increment = self.config.effective_min_increment();

        let mut records = Vec::with_capacity(sorted.len());
        for (index, median) in sorted {
            let timestamp = match self.last_timestamp {
                Some(previous) => median.max(previous.saturating_add_nanos(increment)),
                None => median,
            };
            let Some(node) = self.arena.get_mut(index) else {
                continue;
            };
            node.order = Some(self.next_order);
            records.push(ConsensusRecord {
                event: node.event().descriptor(),
                order: self.next_order,
                timestamp,
                round_received: round,
            });
            self.next_order += 1;
            self.last_timestamp = Some(timestamp);
            self.unordered.remove(&index);
        }

        self.rounds.mark_decided(round);
        self.last_decided = round;
        self.election.forget(witnesses);

        if let Some(min_generation) = judges
            .iter()
            .filter_map(|j| self.arena.get(*j))
            .map(|n| n.generation())
            .min()
        {
            self.judge_generations.insert(round, min_generation);
        }
        let stale = self.advance_threshold(round);

        info!(
            round,
            judges = judges.len(),
            events = records.len(),
            stale = stale.len(),
            ancient_threshold = self.ancient_threshold,
            "round decided"
        );
        ConsensusRound {
            round,
            records,
            ancient_threshold: self.ancient_threshold,
            stale,
        }
    }

    /// Move the ancient threshold to the judge generation of the oldest
    /// round still inside the window and retire everything below it.
    fn advance_threshold(&mut self, decided: u64) -> Vec<EventDescriptor> {
        let mut stale = std::mem::take(&mut self.pending_stale);
        let window = self.config.effective_rounds_non_ancient();
        if decided < window {
            return stale;
        }
        let oldest_kept = decided + 1 - window;

        let candidate = self
            .judge_generations
            .range(..=oldest_kept)
            .next_back()
            .map(|(_, generation)| *generation);
        if let Some(generation) = candidate {
            if generation > self.ancient_threshold {
                self.ancient_threshold = generation;
                for (index, node) in self.arena.retire_below(generation) {
                    self.unordered.remove(&index);
                    if node.order.is_none() {
                        stale.push(node.event().descriptor());
                    }
                }
                self.election.prune(&self.arena);
            }
        }
        self.judge_generations = self.judge_generations.split_off(&oldest_kept);
        self.rounds.remove_below(oldest_kept);
        stale
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Highest round whose fame decisions are complete (0 before the first).
    pub fn last_decided_round(&self) -> u64 {
        self.last_decided
    }

    pub fn max_round(&self) -> u64 {
        self.rounds.max_round()
    }

    pub fn round_state(&self, round: u64) -> Option<RoundState> {
        if round <= self.last_decided && round > 0 {
            return Some(RoundState::Decided);
        }
        self.rounds.state(round)
    }

    pub fn round_of(&self, hash: &EventHash) -> Option<u64> {
        self.node(hash).map(|n| n.round)
    }

    pub fn is_witness(&self, hash: &EventHash) -> bool {
        self.node(hash).is_some_and(|n| n.witness)
    }

    /// Fame of a witness, `None` while undecided or for non-witnesses.
    pub fn is_famous(&self, hash: &EventHash) -> Option<bool> {
        self.node(hash).and_then(|n| n.fame)
    }

    /// Consensus order of an event, once it has one.
    pub fn order_of(&self, hash: &EventHash) -> Option<u64> {
        self.node(hash).and_then(|n| n.order)
    }

    /// Witnesses of `round` sorted by creator.
    pub fn witnesses(&self, round: u64) -> Vec<EventDescriptor> {
        self.rounds
            .witnesses(round)
            .into_iter()
            .filter_map(|w| self.arena.get(w))
            .map(|n| n.event().descriptor())
            .collect()
    }

    pub fn ancient_threshold(&self) -> u64 {
        self.ancient_threshold
    }

    /// Events currently held (not yet retired).
    pub fn event_count(&self) -> usize {
        self.arena.len()
    }

    /// Order index the next consensus record will get.
    pub fn next_order(&self) -> u64 {
        self.next_order
    }

    pub fn memoized_votes(&self) -> usize {
        self.election.memoized()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&FatalError> {
        self.halted.as_ref()
    }

    fn node(&self, hash: &EventHash) -> Option<&crate::arena::EventNode> {
        self.arena.index_of(hash).and_then(|i| self.arena.get(i))
    }
}

#[cfg(test)]
impl ConsensusEngine {
    /// The DAG state fame elections run against.
    pub(crate) fn voting_view(&mut self) -> (&mut EventArena, &Rounds, &Roster) {
        (&mut self.arena, &self.rounds, self.roster.as_ref())
    }
}
