//! Deterministic generator of valid, signed event DAGs.
//!
//! Every member of the roster has equal stake and a key derived from its
//! index, so two generators built with the same parameters produce
//! byte-identical events.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use weft_crypto::{keypair_from_seed, Ed25519Signer, EventSigner};
use weft_types::{
    CreatorId, Event, EventContent, EventDescriptor, KeyPair, Roster, RosterEntry, Timestamp,
    Transaction,
};

/// Stake given to every generated roster member.
pub const MEMBER_STAKE: u64 = 10;

/// How the generator picks the next creator and its other-parent.
pub enum ParentChoice {
    /// Creators take turns; the other-parent is always the event just created.
    RoundRobin,
    /// Random creator and random other-parent among the other creators' latest events.
    Seeded(StdRng),
}

pub struct DagGenerator {
    roster: Arc<Roster>,
    signers: Vec<Ed25519Signer>,
    latest: Vec<Option<EventDescriptor>>,
    previous: Option<EventDescriptor>,
    choice: ParentChoice,
    next_creator: usize,
    next_created: Timestamp,
    step: Duration,
    payload_bytes: usize,
    independent_genesis: bool,
    produced: u64,
}

impl DagGenerator {
    pub fn new(members: usize, choice: ParentChoice) -> Self {
        let members = members.max(1);
        let entries = (0..members)
            .map(|i| RosterEntry {
                id: CreatorId(i as u32),
                public_key: Self::keypair(i).public,
                stake: MEMBER_STAKE,
            })
            .collect();
        let roster = Arc::new(Roster::new(entries).expect("generated roster is dense and staked"));
        let signers = (0..members)
            .map(|i| Ed25519Signer::new(CreatorId(i as u32), Self::keypair(i)))
            .collect();

        Self {
            roster,
            signers,
            latest: vec![None; members],
            previous: None,
            choice,
            next_creator: 0,
            next_created: Timestamp::from_secs(1_000),
            step: Duration::from_millis(1),
            payload_bytes: 0,
            independent_genesis: false,
            produced: 0,
        }
    }

    pub fn round_robin(members: usize) -> Self {
        Self::new(members, ParentChoice::RoundRobin)
    }

    pub fn seeded(members: usize, seed: u64) -> Self {
        Self::new(members, ParentChoice::Seeded(StdRng::seed_from_u64(seed)))
    }

    /// Creation time of the first generated event.
    pub fn with_start(mut self, start: Timestamp) -> Self {
        self.next_created = start;
        self
    }

    /// Gap between consecutive creation times.
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Give every event one transaction of `bytes` bytes.
    pub fn with_payload(mut self, bytes: usize) -> Self {
        self.payload_bytes = bytes;
        self
    }

    /// Give each creator's first event no parents at all.
    pub fn with_independent_genesis(mut self) -> Self {
        self.independent_genesis = true;
        self
    }

    /// Deterministic key pair of roster member `index`.
    pub fn keypair(index: usize) -> KeyPair {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&(index as u64).to_le_bytes());
        seed[31] = 0x5E;
        keypair_from_seed(&seed)
    }

    /// A signer for roster member `index`, independent of this generator.
    pub fn signer(index: usize) -> Ed25519Signer {
        Ed25519Signer::new(CreatorId(index as u32), Self::keypair(index))
    }

    pub fn roster(&self) -> Arc<Roster> {
        Arc::clone(&self.roster)
    }

    pub fn members(&self) -> usize {
        self.signers.len()
    }

    /// Sign arbitrary content with its creator's key (member 0 for unknown creators).
    pub fn sign(&self, content: EventContent) -> Event {
        let signer = self
            .signers
            .get(content.creator.as_index())
            .unwrap_or(&self.signers[0]);
        let hash = content.compute_hash();
        let signature = signer.sign(hash.as_bytes());
        Event::new(content, signature)
    }

    /// Produce the next event of the DAG.
    pub fn next_event(&mut self) -> Event {
        let members = self.signers.len();
        let creator = match &mut self.choice {
            ParentChoice::RoundRobin => {
                let creator = self.next_creator;
                self.next_creator = (self.next_creator + 1) % members;
                creator
            }
            ParentChoice::Seeded(rng) => rng.gen_range(0..members),
        };

        let other_parent = match &mut self.choice {
            ParentChoice::RoundRobin => self
                .previous
                .filter(|p| p.creator.as_index() != creator),
            ParentChoice::Seeded(rng) => {
                let candidates: Vec<EventDescriptor> = self
                    .latest
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index != creator)
                    .filter_map(|(_, latest)| *latest)
                    .collect();
                candidates.choose(rng).copied()
            }
        };

        let self_parent = self.latest[creator];
        let other_parent = if self.independent_genesis && self_parent.is_none() {
            None
        } else {
            other_parent
        };
        let created = self.next_created;
        self.next_created = self.next_created.saturating_add(self.step);

        let transactions = if self.payload_bytes > 0 {
            let mut payload = vec![0u8; self.payload_bytes];
            let tag = self.produced.to_le_bytes();
            let len = tag.len().min(payload.len());
            payload[..len].copy_from_slice(&tag[..len]);
            vec![Transaction::new(payload)]
        } else {
            Vec::new()
        };

        let content = EventContent {
            creator: CreatorId(creator as u32),
            sequence: self_parent.map_or(0, |p| p.sequence + 1),
            self_parent,
            other_parent,
            created,
            transactions,
        };
        let event = self.sign(content);
        let latest = event.descriptor();
        self.latest[creator] = Some(latest);
        self.previous = Some(latest);
        self.produced += 1;
        event
    }

    pub fn generate(&mut self, count: usize) -> Vec<Event> {
        (0..count).map(|_| self.next_event()).collect()
    }
}
