//! Event arena: the DAG as a flat, index-addressed store.
//!
//! Events are stored in insertion order under a dense [`NodeIndex`]. Parent
//! links are indices, never references, so the DAG has no ownership cycles
//! and retiring old events is a matter of clearing slots at the front.
//!
//! Every node carries a `last_seen` vector: for each creator, the highest
//! sequence number among the node's ancestors (itself included). Intake
//! rejects forks, so "x sees y" reduces to `x.last_seen[y.creator] >= y.sequence`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use weft_types::{CreatorId, Event, EventHash, Roster, Signature, Timestamp};

/// Position of an event in the arena. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub usize);

/// An event plus everything consensus has derived about it.
pub struct EventNode {
    event: Arc<Event>,
    self_parent: Option<NodeIndex>,
    other_parent: Option<NodeIndex>,
    last_seen: Vec<Option<u64>>,
    pub(crate) round: u64,
    pub(crate) witness: bool,
    pub(crate) fame: Option<bool>,
    pub(crate) order: Option<u64>,
}

impl EventNode {
    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    pub fn creator(&self) -> CreatorId {
        self.event.creator()
    }

    pub fn sequence(&self) -> u64 {
        self.event.sequence()
    }

    pub fn generation(&self) -> u64 {
        self.event.generation()
    }

    pub fn created(&self) -> Timestamp {
        self.event.created()
    }

    pub fn signature(&self) -> &Signature {
        self.event.signature()
    }

    pub fn hash(&self) -> EventHash {
        self.event.hash()
    }

    /// Self-parent, if it is still in the arena.
    pub fn self_parent(&self) -> Option<NodeIndex> {
        self.self_parent
    }

    /// Other-parent, if it is still in the arena.
    pub fn other_parent(&self) -> Option<NodeIndex> {
        self.other_parent
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn is_witness(&self) -> bool {
        self.witness
    }

    pub fn fame(&self) -> Option<bool> {
        self.fame
    }

    pub fn order(&self) -> Option<u64> {
        self.order
    }

    /// Highest sequence of `creator` among this event's ancestors.
    pub fn last_seen(&self, creator: CreatorId) -> Option<u64> {
        self.last_seen.get(creator.as_index()).copied().flatten()
    }
}

pub struct EventArena {
    nodes: VecDeque<Option<EventNode>>,
    /// Index of `nodes[0]`.
    base: usize,
    by_hash: HashMap<EventHash, NodeIndex>,
    by_slot: HashMap<(CreatorId, u64), NodeIndex>,
    members: usize,
    live: usize,
}

impl EventArena {
    pub fn new(members: usize) -> Self {
        Self {
            nodes: VecDeque::new(),
            base: 0,
            by_hash: HashMap::new(),
            by_slot: HashMap::new(),
            members,
            live: 0,
        }
    }

    /// Append an event whose present parents are given by index. The caller
    /// has checked that the hash and the (creator, sequence) slot are free.
    pub fn insert(
        &mut self,
        event: Arc<Event>,
        self_parent: Option<NodeIndex>,
        other_parent: Option<NodeIndex>,
    ) -> NodeIndex {
        let mut last_seen = vec![None; self.members];
        for parent in [self_parent, other_parent].into_iter().flatten() {
            if let Some(node) = self.get(parent) {
                for (slot, seen) in last_seen.iter_mut().zip(&node.last_seen) {
                    *slot = (*slot).max(*seen);
                }
            }
        }
        // Parents that were retired still count as seen.
        for declared in event.content().parents() {
            if let Some(slot) = last_seen.get_mut(declared.creator.as_index()) {
                *slot = (*slot).max(Some(declared.sequence));
            }
        }
        if let Some(slot) = last_seen.get_mut(event.creator().as_index()) {
            *slot = Some(event.sequence());
        }

        let index = NodeIndex(self.base + self.nodes.len());
        self.by_hash.insert(event.hash(), index);
        self.by_slot
            .insert((event.creator(), event.sequence()), index);
        self.nodes.push_back(Some(EventNode {
            event,
            self_parent,
            other_parent,
            last_seen,
            round: 0,
            witness: false,
            fame: None,
            order: None,
        }));
        self.live += 1;
        index
    }

    pub fn get(&self, index: NodeIndex) -> Option<&EventNode> {
        let offset = index.0.checked_sub(self.base)?;
        self.nodes.get(offset)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: NodeIndex) -> Option<&mut EventNode> {
        let offset = index.0.checked_sub(self.base)?;
        self.nodes.get_mut(offset)?.as_mut()
    }

    pub fn index_of(&self, hash: &EventHash) -> Option<NodeIndex> {
        self.by_hash.get(hash).copied()
    }

    pub fn slot(&self, creator: CreatorId, sequence: u64) -> Option<NodeIndex> {
        self.by_slot.get(&(creator, sequence)).copied()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &EventNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(move |(offset, node)| {
                node.as_ref().map(|n| (NodeIndex(self.base + offset), n))
            })
    }

    /// Whether `a` has `b` as an ancestor (or is `b`).
    pub fn sees(&self, a: NodeIndex, b: NodeIndex) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => {
                matches!(a.last_seen(b.creator()), Some(seq) if seq >= b.sequence())
            }
            _ => false,
        }
    }

    /// Whether `a` sees `b` through events of creators holding a stake
    /// supermajority: for each creator, the latest of its events that `a`
    /// sees must itself see `b`.
    pub fn strongly_sees(&self, a: NodeIndex, b: NodeIndex, roster: &Roster) -> bool {
        let Some(node) = self.get(a) else {
            return false;
        };
        let mut stake = 0u64;
        for (creator, seen) in node.last_seen.iter().enumerate() {
            let creator = CreatorId(creator as u32);
            let Some(sequence) = seen else {
                continue;
            };
            match self.slot(creator, *sequence) {
                Some(latest) if self.sees(latest, b) => {
                    stake = stake.saturating_add(roster.stake_of(creator));
                }
                _ => {}
            }
        }
        roster.is_supermajority(stake)
    }

    /// Remove every event with generation below `threshold`, returning them.
    pub fn retire_below(&mut self, threshold: u64) -> Vec<(NodeIndex, EventNode)> {
        let mut retired = Vec::new();
        for (offset, slot) in self.nodes.iter_mut().enumerate() {
            let expired = matches!(slot, Some(node) if node.generation() < threshold);
            if expired {
                if let Some(node) = slot.take() {
                    retired.push((NodeIndex(self.base + offset), node));
                }
            }
        }
        for (_, node) in &retired {
            self.by_hash.remove(&node.hash());
            self.by_slot.remove(&(node.creator(), node.sequence()));
        }
        self.live -= retired.len();

        while matches!(self.nodes.front(), Some(None)) {
            self.nodes.pop_front();
            self.base += 1;
        }
        retired
    }
}
