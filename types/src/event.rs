//! Events: the immutable, signed vertices of the gossiped hashgraph.
//!
//! An event names its creator, up to two parents (the creator's previous
//! event and one event from another creator), its creation time and the
//! transactions it carries. Parents are referenced through an
//! [`EventDescriptor`] so a receiver can tell which event it is waiting for
//! and how old that event is before the parent itself arrives.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::EventHash;
use crate::keys::Signature;
use crate::time::Timestamp;
use crate::transaction::Transaction;

type Blake2b256 = Blake2b<U32>;

/// Domain separator mixed into every event hash.
const EVENT_HASH_DOMAIN: &[u8] = b"weft.event.v1";

/// Identifies an event creator (a roster member).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CreatorId(pub u32);

impl CreatorId {
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A reference to an event by hash plus the metadata a child needs about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub hash: EventHash,
    pub creator: CreatorId,
    /// Per-creator sequence number, starting at 0.
    pub sequence: u64,
    /// One more than the highest parent generation; 0 for an event without parents.
    pub generation: u64,
}

impl fmt::Display for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}(g{} {})",
            self.creator,
            self.sequence,
            self.generation,
            self.hash.short()
        )
    }
}

/// The signed portion of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContent {
    pub creator: CreatorId,
    pub sequence: u64,
    pub self_parent: Option<EventDescriptor>,
    pub other_parent: Option<EventDescriptor>,
    pub created: Timestamp,
    pub transactions: Vec<Transaction>,
}

impl EventContent {
    /// Generation implied by the declared parents.
    pub fn generation(&self) -> u64 {
        self.parents()
            .map(|p| p.generation + 1)
            .max()
            .unwrap_or(0)
    }

    /// Iterate over the declared parents (self-parent first).
    pub fn parents(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.self_parent.iter().chain(self.other_parent.iter())
    }

    /// Total payload size of the carried transactions.
    pub fn payload_bytes(&self) -> usize {
        self.transactions.iter().map(Transaction::size).sum()
    }

    /// Deterministic byte encoding of the content; this is what gets hashed and signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.payload_bytes());
        out.extend_from_slice(&self.creator.0.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        for parent in [&self.self_parent, &self.other_parent] {
            match parent {
                Some(d) => {
                    out.push(1);
                    out.extend_from_slice(d.hash.as_bytes());
                    out.extend_from_slice(&d.creator.0.to_le_bytes());
                    out.extend_from_slice(&d.sequence.to_le_bytes());
                    out.extend_from_slice(&d.generation.to_le_bytes());
                }
                None => out.push(0),
            }
        }
        out.extend_from_slice(&self.created.as_nanos().to_le_bytes());
        out.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for tx in &self.transactions {
            out.extend_from_slice(&(tx.size() as u32).to_le_bytes());
            out.extend_from_slice(tx.as_bytes());
        }
        out
    }

    /// Blake2b-256 over the domain separator and the canonical bytes.
    pub fn compute_hash(&self) -> EventHash {
        let mut hasher = Blake2b256::new();
        hasher.update(EVENT_HASH_DOMAIN);
        hasher.update(self.canonical_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        EventHash::new(bytes)
    }
}

/// A signed event. Immutable once constructed.
///
/// The creator signs the bytes of [`Event::hash`], which commits to the
/// whole content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    content: EventContent,
    hash: EventHash,
    signature: Signature,
}

impl Event {
    /// Build an event from signed content; the hash is computed here.
    pub fn new(content: EventContent, signature: Signature) -> Self {
        let hash = content.compute_hash();
        Self {
            content,
            hash,
            signature,
        }
    }

    /// Build an event with an explicit (possibly wrong) hash, as received from a peer.
    pub fn from_parts(content: EventContent, hash: EventHash, signature: Signature) -> Self {
        Self {
            content,
            hash,
            signature,
        }
    }

    pub fn content(&self) -> &EventContent {
        &self.content
    }

    pub fn hash(&self) -> EventHash {
        self.hash
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn creator(&self) -> CreatorId {
        self.content.creator
    }

    pub fn sequence(&self) -> u64 {
        self.content.sequence
    }

    pub fn created(&self) -> Timestamp {
        self.content.created
    }

    pub fn generation(&self) -> u64 {
        self.content.generation()
    }

    pub fn self_parent(&self) -> Option<&EventDescriptor> {
        self.content.self_parent.as_ref()
    }

    pub fn other_parent(&self) -> Option<&EventDescriptor> {
        self.content.other_parent.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.content.transactions
    }

    pub fn descriptor(&self) -> EventDescriptor {
        EventDescriptor {
            hash: self.hash,
            creator: self.content.creator,
            sequence: self.content.sequence,
            generation: self.generation(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(creator: u32, sequence: u64) -> EventContent {
        EventContent {
            creator: CreatorId(creator),
            sequence,
            self_parent: None,
            other_parent: None,
            created: Timestamp::from_secs(1),
            transactions: vec![Transaction::new(vec![1, 2, 3])],
        }
    }

    fn descriptor(creator: u32, sequence: u64, generation: u64) -> EventDescriptor {
        EventDescriptor {
            hash: EventHash::new([creator as u8 + 1; 32]),
            creator: CreatorId(creator),
            sequence,
            generation,
        }
    }

    #[test]
    fn generation_without_parents_is_zero() {
        assert_eq!(content(0, 0).generation(), 0);
    }

    #[test]
    fn generation_is_one_above_highest_parent() {
        let mut c = content(0, 3);
        c.self_parent = Some(descriptor(0, 2, 4));
        c.other_parent = Some(descriptor(1, 7, 9));
        assert_eq!(c.generation(), 10);
    }

    #[test]
    fn hash_depends_on_every_field() {
        let base = content(0, 0);
        let h = base.compute_hash();

        let mut other = base.clone();
        other.created = Timestamp::from_secs(2);
        assert_ne!(h, other.compute_hash());

        let mut other = base.clone();
        other.transactions.push(Transaction::new(vec![9]));
        assert_ne!(h, other.compute_hash());

        let mut other = base.clone();
        other.other_parent = Some(descriptor(1, 0, 0));
        assert_ne!(h, other.compute_hash());
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(content(2, 5).compute_hash(), content(2, 5).compute_hash());
    }

    #[test]
    fn event_descriptor_reflects_content() {
        let mut c = content(3, 1);
        c.self_parent = Some(descriptor(3, 0, 0));
        let event = Event::new(c.clone(), Signature::EMPTY);
        let d = event.descriptor();
        assert_eq!(d.creator, CreatorId(3));
        assert_eq!(d.sequence, 1);
        assert_eq!(d.generation, 1);
        assert_eq!(d.hash, c.compute_hash());
    }

    #[test]
    fn event_bincode_roundtrip() {
        let event = Event::new(content(1, 0), Signature([3; 64]));
        let bytes = bincode::serialize(&event).unwrap();
        let back: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, back);
    }
}
