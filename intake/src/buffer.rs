//! Orphan buffer: holds events whose parents have not been admitted yet.
//!
//! A buffered event is indexed under every parent hash it is still missing.
//! When a parent is admitted, the events waiting on it are re-checked, and
//! those with no remaining missing parents are admitted in turn, cascading
//! breadth-first through the buffer.
//!
//! Parents below the ancient threshold are never waited for. Raising the
//! threshold can therefore release orphans as well as drop them.
//!
//! A (creator, sequence) slot belongs to the first event seen for it. A
//! parent declared under a different hash can never arrive, so children
//! naming one are rejected on submission, and orphans already waiting on
//! one are dropped once the slot is taken.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace, warn};
use weft_types::{CreatorId, Event, EventDescriptor, EventHash, Timestamp};

use crate::config::IntakeConfig;
use crate::error::{IntakeError, RejectReason};
use crate::validation::EventValidator;

/// Result of submitting one event.
#[derive(Clone, Debug)]
pub enum IntakeOutcome {
    /// The event and every orphan it unblocked, parents before children.
    Admitted(Vec<Arc<Event>>),
    /// Waiting for at least one parent.
    Buffered,
    /// Already admitted or buffered.
    Duplicate,
}

impl IntakeOutcome {
    pub fn admitted(&self) -> &[Arc<Event>] {
        match self {
            Self::Admitted(events) => events,
            Self::Buffered | Self::Duplicate => &[],
        }
    }
}

/// Effect of raising the ancient threshold.
#[derive(Clone, Debug, Default)]
pub struct ThresholdUpdate {
    /// Orphans whose remaining missing parents became ancient, in topological order.
    pub released: Vec<Arc<Event>>,
    /// Orphans discarded because they became ancient or depended on a rejected orphan.
    pub dropped: Vec<EventDescriptor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub admitted: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub buffered: u64,
    pub dropped: u64,
}

#[derive(Clone, Copy)]
struct KnownEvent {
    descriptor: EventDescriptor,
    created: Timestamp,
}

struct Waiting {
    /// Slot and generation the children declared for the missing parent.
    slot: (CreatorId, u64),
    generation: u64,
    dependents: Vec<EventHash>,
}

pub struct OrphanBuffer {
    config: IntakeConfig,
    validator: EventValidator,
    known: HashMap<EventHash, KnownEvent>,
    /// Admitted and buffered events by (creator, sequence), for fork detection.
    by_slot: HashMap<(CreatorId, u64), EventHash>,
    orphans: HashMap<EventHash, Arc<Event>>,
    waiting: HashMap<EventHash, Waiting>,
    /// Missing parent hashes by the slot they were declared in.
    claims: HashMap<(CreatorId, u64), Vec<EventHash>>,
    ancient_threshold: u64,
    stats: IntakeStats,
}

impl OrphanBuffer {
    pub fn new(config: IntakeConfig, validator: EventValidator) -> Self {
        Self {
            config,
            validator,
            known: HashMap::new(),
            by_slot: HashMap::new(),
            orphans: HashMap::new(),
            waiting: HashMap::new(),
            claims: HashMap::new(),
            ancient_threshold: 0,
            stats: IntakeStats::default(),
        }
    }

    /// Validate an event and admit it, or buffer it until its parents arrive.
    pub fn submit(&mut self, event: Arc<Event>) -> Result<IntakeOutcome, IntakeError> {
        let hash = event.hash();
        if self.known.contains_key(&hash) || self.orphans.contains_key(&hash) {
            self.stats.duplicates += 1;
            trace!(event = %event, "duplicate event ignored");
            return Ok(IntakeOutcome::Duplicate);
        }

        let missing = self
            .check(&event)
            .and_then(|()| self.missing_parents(&event))
            .map_err(|reason| self.reject(&event, reason))?;

        let mut dropped = Vec::new();
        if missing.is_empty() {
            let mut admitted = Vec::new();
            self.admit(Arc::clone(&event), &mut admitted, &mut dropped);
            self.cascade(VecDeque::from([hash]), &mut admitted, &mut dropped);
            self.stats.dropped += dropped.len() as u64;
            return Ok(IntakeOutcome::Admitted(admitted));
        }

        if self.orphans.len() >= self.config.max_orphans {
            return Err(self.reject(&event, RejectReason::BufferFull));
        }

        debug!(
            event = %event,
            missing = missing.len(),
            orphans = self.orphans.len() + 1,
            "event buffered awaiting parents"
        );
        for parent in missing {
            let claims = &mut self.claims;
            self.waiting
                .entry(parent.hash)
                .or_insert_with(|| {
                    claims.entry(slot(&parent)).or_default().push(parent.hash);
                    Waiting {
                        slot: slot(&parent),
                        generation: parent.generation,
                        dependents: Vec::new(),
                    }
                })
                .dependents
                .push(hash);
        }
        let own = (event.creator(), event.sequence());
        self.by_slot.insert(own, hash);
        self.orphans.insert(hash, event);
        self.stats.buffered += 1;
        self.drop_conflicting_claims(own, hash, &mut dropped);
        self.stats.dropped += dropped.len() as u64;
        Ok(IntakeOutcome::Buffered)
    }

    /// Raise the ancient threshold. Lower values are ignored.
    pub fn set_ancient_threshold(&mut self, threshold: u64) -> ThresholdUpdate {
        let mut update = ThresholdUpdate::default();
        if threshold <= self.ancient_threshold {
            return update;
        }
        self.ancient_threshold = threshold;

        let before = self.known.len();
        let by_slot = &mut self.by_slot;
        self.known.retain(|hash, known| {
            let keep = known.descriptor.generation >= threshold;
            if !keep && by_slot.get(&slot(&known.descriptor)) == Some(hash) {
                by_slot.remove(&slot(&known.descriptor));
            }
            keep
        });
        let pruned = before - self.known.len();

        // Ancient orphans go; their dependents may now be admissible.
        let ancient: Vec<EventHash> = self
            .orphans
            .iter()
            .filter(|(_, event)| event.generation() < threshold)
            .map(|(hash, _)| *hash)
            .collect();
        for hash in &ancient {
            if let Some(event) = self.orphans.remove(hash) {
                self.forget_slot(&event);
                update.dropped.push(event.descriptor());
            }
        }

        let mut ready: VecDeque<EventHash> = ancient.into_iter().collect();
        ready.extend(
            self.waiting
                .iter()
                .filter(|(_, waiting)| waiting.generation < threshold)
                .map(|(hash, _)| *hash),
        );
        self.cascade(ready, &mut update.released, &mut update.dropped);
        self.stats.dropped += update.dropped.len() as u64;

        debug!(
            threshold,
            pruned,
            released = update.released.len(),
            dropped = update.dropped.len(),
            "intake ancient threshold raised"
        );
        update
    }

    pub fn ancient_threshold(&self) -> u64 {
        self.ancient_threshold
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn is_known(&self, hash: &EventHash) -> bool {
        self.known.contains_key(hash)
    }

    pub fn is_buffered(&self, hash: &EventHash) -> bool {
        self.orphans.contains_key(hash)
    }

    pub fn stats(&self) -> &IntakeStats {
        &self.stats
    }

    /// Checks that do not depend on the event's parents being present.
    fn check(&self, event: &Event) -> Result<(), RejectReason> {
        if event.generation() < self.ancient_threshold {
            return Err(RejectReason::Ancient);
        }
        self.validator.validate(event)?;

        match self.by_slot.get(&(event.creator(), event.sequence())) {
            Some(existing) if *existing != event.hash() => Err(RejectReason::Equivocation),
            _ => Ok(()),
        }
    }

    /// Declared parents that must still be admitted before this event.
    /// Known parents are checked against their declared descriptors;
    /// ancient ones are treated as present. A parent whose slot is held
    /// by another hash is an equivocation.
    fn missing_parents(&self, event: &Event) -> Result<Vec<EventDescriptor>, RejectReason> {
        let mut missing = Vec::with_capacity(2);
        for (declared, is_self_parent) in event
            .self_parent()
            .map(|d| (d, true))
            .into_iter()
            .chain(event.other_parent().map(|d| (d, false)))
        {
            if let Some(holder) = self.by_slot.get(&slot(declared)) {
                if *holder != declared.hash {
                    return Err(RejectReason::Equivocation);
                }
            }
            match self.known.get(&declared.hash) {
                Some(known) => {
                    if known.descriptor.creator != declared.creator
                        || known.descriptor.sequence != declared.sequence
                    {
                        return Err(RejectReason::ParentMismatch);
                    }
                    if known.descriptor.generation != declared.generation {
                        return Err(RejectReason::GenerationMismatch);
                    }
                    if is_self_parent && event.created() < known.created {
                        return Err(RejectReason::CreationTimeRegression);
                    }
                }
                None if declared.generation < self.ancient_threshold => {}
                None => {
                    if !missing.iter().any(|m: &EventDescriptor| m.hash == declared.hash) {
                        missing.push(*declared);
                    }
                }
            }
        }
        Ok(missing)
    }

    fn admit(
        &mut self,
        event: Arc<Event>,
        admitted: &mut Vec<Arc<Event>>,
        dropped: &mut Vec<EventDescriptor>,
    ) {
        let descriptor = event.descriptor();
        self.known.insert(
            descriptor.hash,
            KnownEvent {
                descriptor,
                created: event.created(),
            },
        );
        self.by_slot.insert(slot(&descriptor), descriptor.hash);
        self.stats.admitted += 1;
        trace!(event = %descriptor, "event admitted");
        admitted.push(event);
        self.drop_conflicting_claims(slot(&descriptor), descriptor.hash, dropped);
    }

    /// `holder` now owns `key`: orphans waiting on any other hash declared
    /// in that slot are rejected together with their dependents.
    fn drop_conflicting_claims(
        &mut self,
        key: (CreatorId, u64),
        holder: EventHash,
        dropped: &mut Vec<EventDescriptor>,
    ) {
        let Some(claimed) = self.claims.get(&key) else {
            return;
        };
        let stale: Vec<EventHash> = claimed.iter().copied().filter(|h| *h != holder).collect();
        for hash in stale {
            let Some(waiting) = self.take_waiting(&hash) else {
                continue;
            };
            for child in waiting.dependents {
                let Some(event) = self.orphans.get(&child).cloned() else {
                    continue;
                };
                self.reject(&event, RejectReason::Equivocation);
                self.drop_orphan(child, dropped);
            }
        }
    }

    fn take_waiting(&mut self, hash: &EventHash) -> Option<Waiting> {
        let waiting = self.waiting.remove(hash)?;
        if let Some(claimed) = self.claims.get_mut(&waiting.slot) {
            claimed.retain(|h| h != hash);
            if claimed.is_empty() {
                self.claims.remove(&waiting.slot);
            }
        }
        Some(waiting)
    }

    /// Re-check every orphan waiting on a hash in `ready`, admitting those
    /// that no longer miss anything and queueing them in turn.
    fn cascade(
        &mut self,
        mut ready: VecDeque<EventHash>,
        admitted: &mut Vec<Arc<Event>>,
        dropped: &mut Vec<EventDescriptor>,
    ) {
        while let Some(parent) = ready.pop_front() {
            let Some(waiting) = self.take_waiting(&parent) else {
                continue;
            };
            for child in waiting.dependents {
                let Some(event) = self.orphans.get(&child).cloned() else {
                    continue;
                };
                match self.missing_parents(&event) {
                    Ok(missing) if missing.is_empty() => {
                        self.orphans.remove(&child);
                        self.admit(event, admitted, dropped);
                        ready.push_back(child);
                    }
                    Ok(_) => {}
                    Err(reason) => {
                        self.reject(&event, reason);
                        self.drop_orphan(child, dropped);
                    }
                }
            }
        }
    }

    /// Remove an orphan and everything buffered behind it.
    fn drop_orphan(&mut self, hash: EventHash, dropped: &mut Vec<EventDescriptor>) {
        let mut stack = vec![hash];
        while let Some(hash) = stack.pop() {
            let Some(event) = self.orphans.remove(&hash) else {
                continue;
            };
            self.forget_slot(&event);
            dropped.push(event.descriptor());
            if let Some(waiting) = self.take_waiting(&hash) {
                stack.extend(waiting.dependents);
            }
        }
    }

    fn forget_slot(&mut self, event: &Event) {
        let key = (event.creator(), event.sequence());
        if self.by_slot.get(&key) == Some(&event.hash()) {
            self.by_slot.remove(&key);
        }
    }

    fn reject(&mut self, event: &Event, reason: RejectReason) -> IntakeError {
        self.stats.rejected += 1;
        let descriptor = event.descriptor();
        warn!(
            creator = %descriptor.creator,
            sequence = descriptor.sequence,
            hash = %descriptor.hash,
            reason = reason.as_str(),
            "event rejected"
        );
        IntakeError::Rejected {
            event: descriptor,
            reason,
        }
    }
}

fn slot(descriptor: &EventDescriptor) -> (CreatorId, u64) {
    (descriptor.creator, descriptor.sequence)
}
