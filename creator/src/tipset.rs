//! Tipset tracking for other-parent selection.
//!
//! An event's tipset is, per creator, the highest sequence number it
//! descends from. Choosing the other-parent whose tipset adds the most
//! stake-weighted progress over the self-parent's tipset is what lets new
//! events strongly see the previous round quickly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;
use weft_types::{CreatorId, Event, EventDescriptor, EventHash, Roster};

/// Per-creator highest sequence an event descends from.
pub type Tipset = Vec<Option<u64>>;

struct Tracked {
    tipset: Tipset,
    generation: u64,
}

pub struct TipsetTracker {
    roster: Arc<Roster>,
    tracked: HashMap<EventHash, Tracked>,
    latest: Vec<Option<EventDescriptor>>,
    ancient_threshold: u64,
}

impl TipsetTracker {
    pub fn new(roster: Arc<Roster>) -> Self {
        let members = roster.len();
        Self {
            roster,
            tracked: HashMap::new(),
            latest: vec![None; members],
            ancient_threshold: 0,
        }
    }

    /// Record an event. Parents should be observed first; an unknown
    /// parent only contributes its own descriptor.
    pub fn observe(&mut self, event: &Event) {
        let hash = event.hash();
        if self.tracked.contains_key(&hash) || event.generation() < self.ancient_threshold {
            return;
        }
        let creator = event.creator();
        if !self.roster.contains(creator) {
            return;
        }

        let mut tipset: Tipset = vec![None; self.latest.len()];
        for parent in event.content().parents() {
            if let Some(parent_tipset) = self.tracked.get(&parent.hash).map(|t| &t.tipset) {
                merge(&mut tipset, parent_tipset);
            }
            raise(&mut tipset, parent.creator, parent.sequence);
        }
        raise(&mut tipset, creator, event.sequence());

        let descriptor = event.descriptor();
        if let Some(latest) = self.latest.get_mut(creator.as_index()) {
            if latest.map_or(true, |l| l.sequence < descriptor.sequence) {
                *latest = Some(descriptor);
            }
        }
        self.tracked.insert(
            hash,
            Tracked {
                tipset,
                generation: descriptor.generation,
            },
        );
        trace!(event = %descriptor, "tipset recorded");
    }

    pub fn tipset(&self, hash: &EventHash) -> Option<&[Option<u64>]> {
        self.tracked.get(hash).map(|t| t.tipset.as_slice())
    }

    /// Latest observed event of `creator`.
    pub fn latest(&self, creator: CreatorId) -> Option<EventDescriptor> {
        self.latest.get(creator.as_index()).copied().flatten()
    }

    /// Stake of the creators for which `candidate`'s tipset is ahead of
    /// `self_parent`'s.
    pub fn advancement(&self, self_parent: Option<&EventHash>, candidate: &EventHash) -> u64 {
        let Some(candidate) = self.tipset(candidate) else {
            return 0;
        };
        let base = self_parent.and_then(|h| self.tipset(h));
        candidate
            .iter()
            .enumerate()
            .filter(|(index, seen)| {
                let known = base.and_then(|b| b.get(*index).copied().flatten());
                **seen > known
            })
            .fold(0u64, |acc, (index, _)| {
                acc.saturating_add(self.roster.stake_of(CreatorId(index as u32)))
            })
    }

    /// Pick the other-parent for `creator`'s next event.
    ///
    /// Among the latest non-ancient event of every other creator, the one
    /// with the highest advancement wins, ties going to the lowest creator
    /// id. Candidates that advance nothing are not eligible. For a first
    /// event the candidate with the highest generation is taken.
    pub fn select_other_parent(
        &self,
        creator: CreatorId,
        self_parent: Option<&EventDescriptor>,
    ) -> Option<EventDescriptor> {
        let candidates = self
            .latest
            .iter()
            .flatten()
            .filter(|c| c.creator != creator && c.generation >= self.ancient_threshold);

        match self_parent {
            None => candidates
                .max_by(|a, b| {
                    a.generation
                        .cmp(&b.generation)
                        .then_with(|| b.creator.cmp(&a.creator))
                })
                .copied(),
            Some(self_parent) => candidates
                .map(|c| (self.advancement(Some(&self_parent.hash), &c.hash), c))
                .filter(|(advancement, _)| *advancement > 0)
                .max_by(|(a, ca), (b, cb)| a.cmp(b).then_with(|| cb.creator.cmp(&ca.creator)))
                .map(|(_, c)| *c),
        }
    }

    /// Forget events below `threshold`. Latest entries are kept so the
    /// creator's own chain can continue.
    pub fn set_ancient_threshold(&mut self, threshold: u64) {
        if threshold <= self.ancient_threshold {
            return;
        }
        self.ancient_threshold = threshold;
        let latest: Vec<EventHash> = self.latest.iter().flatten().map(|l| l.hash).collect();
        self.tracked
            .retain(|hash, t| t.generation >= threshold || latest.contains(hash));
    }

    pub fn ancient_threshold(&self) -> u64 {
        self.ancient_threshold
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

fn merge(into: &mut Tipset, other: &[Option<u64>]) {
    for (slot, seen) in into.iter_mut().zip(other) {
        *slot = (*slot).max(*seen);
    }
}

fn raise(tipset: &mut Tipset, creator: CreatorId, sequence: u64) {
    if let Some(slot) = tipset.get_mut(creator.as_index()) {
        *slot = (*slot).max(Some(sequence));
    }
}
