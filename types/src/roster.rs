//! The roster: the fixed stake table of event creators.
//!
//! Every stake-weighted threshold in the consensus core (strongly seeing,
//! fame supermajorities, tipset advancement) is computed against the roster.
//! Creator ids are dense (`0..n`) so per-creator state can live in vectors
//! indexed by [`CreatorId::as_index`].

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::event::CreatorId;
use crate::keys::PublicKey;

/// One creator's identity and voting stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: CreatorId,
    pub public_key: PublicKey,
    pub stake: u64,
}

/// Stake table with cached total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    total_stake: u64,
}

impl Roster {
    /// Build a roster. Entries must be numbered `0..n` in order and carry non-zero total stake.
    pub fn new(entries: Vec<RosterEntry>) -> Result<Self, TypesError> {
        if entries.is_empty() {
            return Err(TypesError::EmptyRoster);
        }
        for (position, entry) in entries.iter().enumerate() {
            if entry.id.as_index() != position {
                if entries[..position].iter().any(|e| e.id == entry.id) {
                    return Err(TypesError::DuplicateCreator(entry.id.0));
                }
                return Err(TypesError::NonDenseCreatorIds {
                    position,
                    found: entry.id.0,
                });
            }
        }
        let total_stake = entries
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.stake));
        if total_stake == 0 {
            return Err(TypesError::ZeroTotalStake);
        }
        Ok(Self {
            entries,
            total_stake,
        })
    }

    /// Number of creators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_stake(&self) -> u64 {
        self.total_stake
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn contains(&self, id: CreatorId) -> bool {
        id.as_index() < self.entries.len()
    }

    /// Stake of a creator. Returns 0 if not a member.
    pub fn stake_of(&self, id: CreatorId) -> u64 {
        self.entries.get(id.as_index()).map_or(0, |e| e.stake)
    }

    pub fn public_key(&self, id: CreatorId) -> Option<&PublicKey> {
        self.entries.get(id.as_index()).map(|e| &e.public_key)
    }

    /// Creator ids in roster order.
    pub fn ids(&self) -> impl Iterator<Item = CreatorId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Whether `stake` is strictly more than two thirds of the total.
    pub fn is_supermajority(&self, stake: u64) -> bool {
        (stake as u128) * 3 > (self.total_stake as u128) * 2
    }

    /// Whether `stake` is strictly more than half of the total.
    pub fn is_majority(&self, stake: u64) -> bool {
        (stake as u128) * 2 > self.total_stake as u128
    }
}
