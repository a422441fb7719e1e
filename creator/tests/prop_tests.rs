use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use weft_creator::{CreationConfig, CreationInputs, EventCreator, TipsetTracker};
use weft_nullables::DagGenerator;
use weft_txpool::{TransactionPool, TxPoolConfig};
use weft_types::{CreatorId, PlatformStatus, Timestamp, Transaction};

struct Member {
    creator: EventCreator,
    tipsets: Arc<Mutex<TipsetTracker>>,
    pool: Arc<TransactionPool>,
}

fn members(count: usize) -> Vec<Member> {
    let roster = DagGenerator::round_robin(count).roster();
    let config = CreationConfig {
        max_creation_rate: 0.0,
        heartbeat_interval_ms: 0,
        max_payload_bytes: 64,
        ..CreationConfig::default()
    };
    (0..count)
        .map(|i| {
            let tipsets = Arc::new(Mutex::new(TipsetTracker::new(Arc::clone(&roster))));
            let pool = Arc::new(TransactionPool::new(TxPoolConfig::default()));
            let creator = EventCreator::new(
                Arc::new(DagGenerator::signer(i)),
                config.clone(),
                Arc::clone(&tipsets),
                Arc::clone(&pool),
            );
            Member { creator, tipsets, pool }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Sequences grow by one, creation times never go backwards, and the
    /// other-parent always belongs to someone else.
    #[test]
    fn created_events_respect_chain_invariants(
        count in 2usize..6,
        turns in prop::collection::vec((0usize..6, 0u64..3, 0usize..3), 1..120),
    ) {
        let mut members = members(count);
        let mut clock = Timestamp::from_secs(100);
        let mut last: HashMap<CreatorId, (u64, Timestamp)> = HashMap::new();

        for (who, tick, txs) in turns {
            let who = who % count;
            clock = clock.saturating_add_nanos(tick);
            for n in 0..txs {
                members[who].pool.submit(Transaction::new(vec![n as u8 + 1; 20]));
            }
            let inputs = CreationInputs {
                now: clock,
                platform_status: PlatformStatus::Active,
                healthy: true,
                backlog: 0,
            };
            let Some(event) = members[who].creator.maybe_create_event(inputs).unwrap() else {
                continue;
            };

            prop_assert!(event.content().payload_bytes() <= 64);
            if let Some(other) = event.other_parent() {
                prop_assert_ne!(other.creator, event.creator());
            }
            match last.get(&event.creator()) {
                Some((sequence, created)) => {
                    prop_assert_eq!(event.sequence(), sequence + 1);
                    prop_assert!(event.created() > *created);
                }
                None => prop_assert_eq!(event.sequence(), 0),
            }
            last.insert(event.creator(), (event.sequence(), event.created()));

            for member in &members {
                member.tipsets.lock().observe(&event);
            }
        }
    }
}
