//! End-to-end tests: several platforms relaying gossip to one another
//! until they agree on a consensus order.

use std::sync::Arc;
use std::time::Duration;

use weft_crypto::Ed25519Verifier;
use weft_node::{Platform, PlatformConfig, PlatformError};
use weft_nullables::{DagGenerator, NullClock, RecordingGossip, RecordingSink, StaticStatus};
use weft_creator::EventCreationStatus;
use weft_types::{ConsensusRecord, Event, PlatformStatus, Roster, Signature, Transaction};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Member {
    platform: Platform,
    gossip: Arc<RecordingGossip>,
    sink: Arc<RecordingSink>,
    status: Arc<StaticStatus>,
    clock: Arc<NullClock>,
}

fn test_config() -> PlatformConfig {
    let mut config = PlatformConfig::default();
    config.wiring.worker_threads = 2;
    config.creation.max_creation_rate = 0.0;
    config.creation.heartbeat_interval_ms = 0;
    config
}

fn member(config: PlatformConfig, roster: Arc<Roster>, index: usize) -> Member {
    let gossip = Arc::new(RecordingGossip::new());
    let sink = Arc::new(RecordingSink::new());
    let status = Arc::new(StaticStatus::default());
    let clock = Arc::new(NullClock::default());
    let platform = Platform::build(
        config,
        roster,
        Arc::new(DagGenerator::signer(index)),
        Arc::new(Ed25519Verifier),
        gossip.clone(),
        sink.clone(),
        status.clone(),
        clock.clone(),
    )
    .expect("platform builds");
    Member {
        platform,
        gossip,
        sink,
        status,
        clock,
    }
}

fn cluster(size: usize) -> Vec<Member> {
    let roster = DagGenerator::round_robin(size).roster();
    (0..size)
        .map(|i| member(test_config(), Arc::clone(&roster), i))
        .collect()
}

/// Every member tries to create one event, then every broadcast is relayed
/// to every other member.
fn step(members: &[Member]) {
    for m in members {
        m.platform.create_event_now().expect("creation queued");
    }
    for m in members {
        m.platform.flush();
    }
    let broadcasts: Vec<Vec<Event>> = members.iter().map(|m| m.gossip.take()).collect();
    for (from, events) in broadcasts.iter().enumerate() {
        for (to, m) in members.iter().enumerate() {
            if from == to {
                continue;
            }
            for event in events {
                m.platform
                    .on_event_received(Arc::new(event.clone()))
                    .expect("event delivered");
            }
        }
    }
    for m in members {
        m.platform.flush();
        m.clock.advance(Duration::from_millis(10));
    }
}

fn assert_well_formed(records: &[ConsensusRecord]) {
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.order, i as u64);
        if i > 0 {
            assert!(record.timestamp > records[i - 1].timestamp);
            assert!(record.round_received >= records[i - 1].round_received);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn four_members_agree_on_order() {
    let members = cluster(4);
    for _ in 0..40 {
        step(&members);
    }

    let orders: Vec<Vec<ConsensusRecord>> = members.iter().map(|m| m.sink.records()).collect();
    let shortest = orders.iter().map(Vec::len).min().unwrap_or(0);
    assert!(shortest > 0, "no events reached consensus");

    for (m, records) in members.iter().zip(&orders) {
        assert_well_formed(records);
        assert!(m.platform.last_decided_round() >= 1);
        assert!(!m.platform.is_halted());
        assert_eq!(m.platform.metrics().consensus_events.get(), records.len() as u64);
    }
    for records in &orders[1..] {
        assert_eq!(&records[..shortest], &orders[0][..shortest]);
    }
}

#[test]
fn ancient_threshold_advances_and_events_retire() {
    let mut config = test_config();
    config.consensus.rounds_non_ancient = 3;
    let roster = DagGenerator::round_robin(4).roster();
    let members: Vec<Member> = (0..4)
        .map(|i| member(config.clone(), Arc::clone(&roster), i))
        .collect();
    for _ in 0..60 {
        step(&members);
    }

    for m in &members {
        assert!(m.platform.ancient_threshold() > 0);
        // Retired events are dropped from the tipset tracker as well.
        assert!(m.platform.tracked_events() < 4 * 60);
        let rounds = m.sink.rounds();
        let thresholds: Vec<u64> = rounds.iter().map(|r| r.ancient_threshold).collect();
        assert!(thresholds.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn transactions_ride_in_created_events() {
    let members = cluster(4);
    let tx = Transaction::new(b"transfer 10".to_vec());
    assert!(members[0].platform.submit_transaction(tx.clone()));
    assert_eq!(members[0].platform.pending_transactions(), 1);

    members[0].platform.create_event_now().unwrap();
    members[0].platform.flush();

    let sent = members[0].gossip.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].transactions(), &[tx]);
    assert_eq!(members[0].platform.pending_transactions(), 0);
    assert_eq!(members[0].platform.metrics().transactions_submitted.get(), 1);

    assert!(!members[0].platform.submit_transaction(Transaction::new(Vec::new())));
    assert_eq!(members[0].platform.metrics().transactions_rejected.get(), 1);
}

#[test]
fn observing_member_does_not_create() {
    let members = cluster(4);
    members[2].status.set(PlatformStatus::Observing);
    for _ in 0..3 {
        step(&members);
    }

    assert_eq!(
        members[2].platform.creation_status(),
        EventCreationStatus::PlatformStatus
    );
    assert_eq!(members[2].platform.metrics().events_created.get(), 0);
    // It still takes in everyone else's events.
    assert_eq!(members[2].platform.metrics().events_admitted.get(), 3 * 3);
}

#[test]
fn invalid_event_is_rejected() {
    let members = cluster(4);
    members[1].platform.create_event_now().unwrap();
    members[1].platform.flush();
    let genuine = members[1].gossip.take().remove(0);

    let forged = Event::new(genuine.content().clone(), Signature([7; 64]));
    members[0]
        .platform
        .on_event_received(Arc::new(forged))
        .unwrap();
    members[0].platform.flush();
    assert_eq!(members[0].platform.metrics().events_rejected.get(), 1);
    assert_eq!(members[0].platform.metrics().events_admitted.get(), 0);

    members[0]
        .platform
        .on_event_received(Arc::new(genuine))
        .unwrap();
    members[0].platform.flush();
    assert_eq!(members[0].platform.metrics().events_admitted.get(), 1);
}

#[test]
fn shut_down_platform_refuses_work() {
    let members = cluster(4);
    members[0].platform.shutdown();
    assert!(matches!(
        members[0].platform.create_event_now(),
        Err(PlatformError::Wire(_))
    ));
    let event = DagGenerator::round_robin(4).next_event();
    assert!(members[0].platform.on_event_received(Arc::new(event)).is_err());
}

#[test]
fn builds_from_toml_config() {
    let config = PlatformConfig::from_toml_str(
        r#"
[wiring]
worker_threads = 2

[wiring.capacities]
event_creation = 4
intake = 128

[creation]
max_creation_rate = 0.0
heartbeat_interval_ms = 0

[consensus]
rounds_non_ancient = 6
"#,
    )
    .unwrap();
    assert_eq!(config.wiring.capacity_of(config.wiring.capacities.intake), 128);

    let roster = DagGenerator::round_robin(4).roster();
    let m = member(config, roster, 3);
    m.platform.create_event_now().unwrap();
    m.platform.flush();
    assert_eq!(m.gossip.len(), 1);
    assert_eq!(m.platform.config().consensus.rounds_non_ancient, 6);
}
