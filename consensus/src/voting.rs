//! Virtual voting on witness fame.
//!
//! Nobody sends votes over the network: each witness's vote on an earlier
//! witness is computed locally from the DAG.
//!
//! - A witness one round later votes "famous" iff it sees the candidate.
//! - Further rounds vote with the stake-weighted majority of the previous
//!   round's witnesses they strongly see (ties vote "famous"). If that
//!   majority is a supermajority, the candidate's fame is decided.
//! - In a coin round, a vote without a supermajority behind it is the middle
//!   bit of the voter's signature instead, and nothing is decided.
//!
//! Votes only depend on the DAG below the voter, so they are memoized until
//! the candidate's round is decided.

use std::collections::HashMap;

use weft_types::Roster;

use crate::arena::{EventArena, NodeIndex};
use crate::round::Rounds;

#[derive(Clone, Copy, Debug)]
struct Vote {
    value: bool,
    decides: bool,
}

pub(crate) struct FameElection {
    votes: HashMap<(NodeIndex, NodeIndex), Vote>,
    coin_frequency: u64,
}

impl FameElection {
    pub fn new(coin_frequency: u64) -> Self {
        Self {
            votes: HashMap::new(),
            coin_frequency,
        }
    }

    /// Try to decide every undecided witness in rounds after `last_decided`.
    /// Returns the witnesses decided by this pass.
    pub fn decide(
        &mut self,
        arena: &mut EventArena,
        rounds: &Rounds,
        roster: &Roster,
        last_decided: u64,
    ) -> Vec<NodeIndex> {
        let mut decided = Vec::new();
        for round in rounds.numbers_from(last_decided + 1) {
            let candidates: Vec<NodeIndex> = rounds
                .witnesses(round)
                .into_iter()
                .filter(|w| matches!(arena.get(*w), Some(node) if node.fame.is_none()))
                .collect();

            'candidate: for candidate in candidates {
                for voting_round in rounds.numbers_from(round + 1) {
                    for voter in rounds.witnesses(voting_round) {
                        let Some(vote) = self.vote(arena, rounds, roster, voter, candidate, round)
                        else {
                            continue;
                        };
                        if vote.decides {
                            if let Some(node) = arena.get_mut(candidate) {
                                node.fame = Some(vote.value);
                            }
                            decided.push(candidate);
                            continue 'candidate;
                        }
                    }
                }
            }
        }
        decided
    }

    fn vote(
        &mut self,
        arena: &EventArena,
        rounds: &Rounds,
        roster: &Roster,
        voter: NodeIndex,
        candidate: NodeIndex,
        candidate_round: u64,
    ) -> Option<Vote> {
        if let Some(vote) = self.votes.get(&(voter, candidate)) {
            return Some(*vote);
        }
        let voter_node = arena.get(voter)?;
        let distance = voter_node.round.checked_sub(candidate_round)?;

        let vote = if distance == 0 {
            return None;
        } else if distance == 1 {
            Vote {
                value: arena.sees(voter, candidate),
                decides: false,
            }
        } else {
            let (mut yes, mut no) = (0u64, 0u64);
            for witness in rounds.witnesses(voter_node.round - 1) {
                if !arena.strongly_sees(voter, witness, roster) {
                    continue;
                }
                let Some(stake) = arena.get(witness).map(|n| roster.stake_of(n.creator())) else {
                    continue;
                };
                match self.vote(arena, rounds, roster, witness, candidate, candidate_round) {
                    Some(Vote { value: true, .. }) => yes = yes.saturating_add(stake),
                    Some(Vote { value: false, .. }) => no = no.saturating_add(stake),
                    None => {}
                }
            }
            let value = yes >= no;
            let supermajority = roster.is_supermajority(yes.max(no));

            if distance % self.coin_frequency != 0 {
                Vote {
                    value,
                    decides: supermajority,
                }
            } else if supermajority {
                Vote {
                    value,
                    decides: false,
                }
            } else {
                Vote {
                    value: voter_node.signature().middle_bit(),
                    decides: false,
                }
            }
        };

        self.votes.insert((voter, candidate), vote);
        Some(vote)
    }

    /// Drop memoized votes on the given candidates.
    pub fn forget(&mut self, candidates: &[NodeIndex]) {
        self.votes.retain(|(_, candidate), _| !candidates.contains(candidate));
    }

    /// Drop memoized votes that involve events no longer in the arena.
    pub fn prune(&mut self, arena: &EventArena) {
        self.votes.retain(|(voter, candidate), _| {
            arena.get(*voter).is_some() && arena.get(*candidate).is_some()
        });
    }

    pub fn memoized(&self) -> usize {
        self.votes.len()
    }
}
