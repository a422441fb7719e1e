//! Builds, signs and routes this node's own events.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use weft_crypto::EventSigner;
use weft_txpool::TransactionPool;
use weft_types::{
    CreatorId, Event, EventContent, EventDescriptor, PlatformStatus, Roster, Timestamp,
};
use weft_wire::WireHandle;

use crate::config::CreationConfig;
use crate::error::CreatorError;
use crate::rules::{CreationContext, EventCreationRules, EventCreationStatus};
use crate::tipset::TipsetTracker;

/// Where a freshly created event goes: out to peers and into local intake.
#[derive(Clone)]
pub struct EventRouting {
    pub gossip: WireHandle<Arc<Event>>,
    pub intake: WireHandle<Arc<Event>>,
}

/// The part of the creation context that comes from outside the creator.
#[derive(Clone, Copy, Debug)]
pub struct CreationInputs {
    pub now: Timestamp,
    pub platform_status: PlatformStatus,
    pub healthy: bool,
    pub backlog: usize,
}

pub struct EventCreator {
    creator: CreatorId,
    signer: Arc<dyn EventSigner>,
    config: CreationConfig,
    rules: EventCreationRules,
    tipsets: Arc<Mutex<TipsetTracker>>,
    pool: Arc<TransactionPool>,
    routing: Option<EventRouting>,
    last_own: Option<(EventDescriptor, Timestamp)>,
    created: u64,
}

impl EventCreator {
    pub fn new(
        signer: Arc<dyn EventSigner>,
        config: CreationConfig,
        tipsets: Arc<Mutex<TipsetTracker>>,
        pool: Arc<TransactionPool>,
    ) -> Self {
        let rules = EventCreationRules::new(config.rules());
        Self {
            creator: signer.creator(),
            signer,
            config,
            rules,
            tipsets,
            pool,
            routing: None,
            last_own: None,
            created: 0,
        }
    }

    /// Check that the signer belongs to a roster member.
    pub fn validate(&self, roster: &Roster) -> Result<(), CreatorError> {
        if !roster.contains(self.creator) {
            return Err(CreatorError::NotInRoster(self.creator));
        }
        Ok(())
    }

    pub fn with_routing(mut self, routing: EventRouting) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn creator(&self) -> CreatorId {
        self.creator
    }

    pub fn config(&self) -> &CreationConfig {
        &self.config
    }

    pub fn status(&self) -> EventCreationStatus {
        self.rules.status()
    }

    /// Number of events created so far.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// The latest event this creator made, its self-parent for the next one.
    pub fn last_event(&self) -> Option<EventDescriptor> {
        self.last_own.map(|(descriptor, _)| descriptor)
    }

    /// Create, sign and route a new event if the rules allow it.
    pub fn maybe_create_event(
        &mut self,
        inputs: CreationInputs,
    ) -> Result<Option<Arc<Event>>, CreatorError> {
        let self_parent = self.last_own.map(|(descriptor, _)| descriptor);
        let other_parent = self
            .tipsets
            .lock()
            .select_other_parent(self.creator, self_parent.as_ref());

        let ctx = CreationContext {
            now: inputs.now,
            platform_status: inputs.platform_status,
            healthy: inputs.healthy,
            backlog: inputs.backlog,
            has_eligible_parent: other_parent.is_some(),
            first_event: self_parent.is_none(),
            pending_transactions: self.pool.len(),
            last_created: self.last_own.map(|(_, created)| created),
        };
        let status = self.rules.evaluate(&ctx);
        if status != EventCreationStatus::Attempting {
            debug!(creator = %self.creator, status = %status, "event creation not permitted");
            return Ok(None);
        }

        let created = match self.last_own {
            Some((_, previous)) => inputs.now.max(previous.saturating_add_nanos(1)),
            None => inputs.now,
        };
        let content = EventContent {
            creator: self.creator,
            sequence: self_parent.map_or(0, |p| p.sequence + 1),
            self_parent,
            other_parent,
            created,
            transactions: self.pool.drain(self.config.max_payload_bytes),
        };
        let hash = content.compute_hash();
        let signature = self.signer.sign(hash.as_bytes());
        let event = Arc::new(Event::new(content, signature));
        let descriptor = event.descriptor();

        self.tipsets.lock().observe(&event);
        self.rules.event_was_created(created);
        self.last_own = Some((descriptor, created));
        self.created += 1;

        info!(
            event = %descriptor,
            other_parent = ?other_parent.map(|p| p.creator.0),
            transactions = event.transactions().len(),
            "event created"
        );

        if let Some(routing) = &self.routing {
            routing.gossip.submit(Arc::clone(&event))?;
            routing.intake.submit(Arc::clone(&event))?;
        }
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use weft_crypto::verify_signature;
    use weft_nullables::DagGenerator;
    use weft_txpool::TxPoolConfig;
    use weft_types::Transaction;

    fn inputs(now: Timestamp) -> CreationInputs {
        CreationInputs {
            now,
            platform_status: PlatformStatus::Active,
            healthy: true,
            backlog: 0,
        }
    }

    fn unthrottled() -> CreationConfig {
        CreationConfig {
            max_creation_rate: 0.0,
            heartbeat_interval_ms: 0,
            ..CreationConfig::default()
        }
    }

    fn setup(index: usize, members: usize) -> (EventCreator, Arc<Mutex<TipsetTracker>>, Arc<TransactionPool>) {
        let roster = DagGenerator::round_robin(members).roster();
        let tipsets = Arc::new(Mutex::new(TipsetTracker::new(roster)));
        let pool = Arc::new(TransactionPool::new(TxPoolConfig::default()));
        let creator = EventCreator::new(
            Arc::new(DagGenerator::signer(index)),
            unthrottled(),
            Arc::clone(&tipsets),
            Arc::clone(&pool),
        );
        (creator, tipsets, pool)
    }

    #[test]
    fn first_event_has_no_parents_without_peers() {
        let (mut creator, _, _) = setup(0, 4);
        let event = creator
            .maybe_create_event(inputs(Timestamp::from_secs(1)))
            .unwrap()
            .unwrap();
        assert_eq!(event.sequence(), 0);
        assert!(event.self_parent().is_none());
        assert!(event.other_parent().is_none());

        let roster = DagGenerator::round_robin(4).roster();
        let key = roster.public_key(CreatorId(0)).unwrap();
        assert!(verify_signature(event.hash().as_bytes(), event.signature(), key));
    }

    #[test]
    fn needs_new_information_after_first_event() {
        let (mut creator, tipsets, _) = setup(0, 4);
        let t = Timestamp::from_secs(1);
        creator.maybe_create_event(inputs(t)).unwrap().unwrap();
        assert!(creator.maybe_create_event(inputs(t)).unwrap().is_none());
        assert_eq!(creator.status(), EventCreationStatus::NoEligibleParents);

        // A peer's event that has not seen ours advances our view.
        let mut peers = DagGenerator::round_robin(4);
        let _ = peers.next_event();
        let peer = peers.next_event();
        tipsets.lock().observe(&peer);

        let second = creator.maybe_create_event(inputs(t)).unwrap().unwrap();
        assert_eq!(second.sequence(), 1);
        assert_eq!(second.other_parent().map(|p| p.hash), Some(peer.hash()));
        assert_eq!(second.self_parent().map(|p| p.sequence), Some(0));
        // Created strictly after the self-parent even with a stalled clock.
        assert!(second.created() > t);
    }

    #[test]
    fn drains_pool_up_to_payload_limit() {
        let (mut creator, _, pool) = setup(1, 3);
        creator.config.max_payload_bytes = 10;
        for _ in 0..3 {
            assert!(pool.submit(Transaction::new(vec![1u8; 4])));
        }
        let event = creator
            .maybe_create_event(inputs(Timestamp::from_secs(2)))
            .unwrap()
            .unwrap();
        assert_eq!(event.transactions().len(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn platform_status_blocks_creation() {
        let (mut creator, _, _) = setup(0, 4);
        let mut blocked = inputs(Timestamp::from_secs(1));
        blocked.platform_status = PlatformStatus::Behind;
        assert!(creator.maybe_create_event(blocked).unwrap().is_none());
        assert_eq!(creator.status(), EventCreationStatus::PlatformStatus);
        assert_eq!(creator.created_count(), 0);
    }

    #[test]
    fn rate_limit_applies_between_events() {
        let (mut creator, _, _) = setup(2, 4);
        creator.rules = EventCreationRules::new(
            CreationConfig {
                max_creation_rate: 10.0,
                heartbeat_interval_ms: 0,
                ..CreationConfig::default()
            }
            .rules(),
        );
        let start = Timestamp::from_secs(3);
        assert!(creator.maybe_create_event(inputs(start)).unwrap().is_some());
        let soon = start.saturating_add(Duration::from_millis(10));
        assert!(creator.maybe_create_event(inputs(soon)).unwrap().is_none());
        assert_eq!(creator.status(), EventCreationStatus::RateLimited);
    }

    #[test]
    fn signer_outside_roster_is_rejected() {
        let (creator, _, _) = setup(5, 6);
        let small = DagGenerator::round_robin(3).roster();
        assert!(matches!(
            creator.validate(&small),
            Err(CreatorError::NotInRoster(CreatorId(5)))
        ));
    }
}
