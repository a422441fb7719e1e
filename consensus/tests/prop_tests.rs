use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use weft_consensus::{ConsensusConfig, ConsensusEngine};
use weft_nullables::DagGenerator;
use weft_types::{ConsensusRecord, Event, EventHash};

fn run(events: &[Event], config: ConsensusConfig, roster: Arc<weft_types::Roster>) -> Vec<ConsensusRecord> {
    let mut engine = ConsensusEngine::new(roster, config);
    let mut records = Vec::new();
    for event in events {
        for round in engine.add_event(Arc::new(event.clone())).unwrap() {
            records.extend(round.records);
        }
    }
    records
}

/// Reorder `events` at random while keeping every parent before its children.
fn shuffle_topologically(events: &[Event], seed: u64) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut remaining: Vec<Event> = events.to_vec();
    let mut placed: HashSet<EventHash> = HashSet::new();
    let mut out = Vec::with_capacity(events.len());
    while !remaining.is_empty() {
        let ready: Vec<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, e)| e.content().parents().all(|p| placed.contains(&p.hash)))
            .map(|(i, _)| i)
            .collect();
        let Some(&pick) = ready.choose(&mut rng) else {
            break;
        };
        let event = remaining.swap_remove(pick);
        placed.insert(event.hash());
        out.push(event);
    }
    out
}

/// Feed the first four events of `generator`, then keep generating until
/// all four are ordered. Returns their records in consensus order.
fn first_four_records(mut generator: DagGenerator) -> Vec<ConsensusRecord> {
    let mut engine = ConsensusEngine::new(generator.roster(), ConsensusConfig::default());
    let first = generator.generate(4);
    for event in &first {
        engine.add_event(Arc::new(event.clone())).unwrap();
    }
    assert_eq!(engine.witnesses(1).len(), 4);

    let wanted: HashSet<EventHash> = first.iter().map(|e| e.hash()).collect();
    let mut records = Vec::new();
    for _ in 0..200 {
        let event = generator.next_event();
        for round in engine.add_event(Arc::new(event)).unwrap() {
            records.extend(round.records);
        }
        let seen = records.iter().filter(|r| wanted.contains(&r.event.hash)).count();
        if seen == wanted.len() {
            break;
        }
    }
    records.retain(|r| wanted.contains(&r.event.hash));
    records
}

fn assert_ordered(records: &[ConsensusRecord]) {
    assert_eq!(records.len(), 4);
    let orders: HashSet<u64> = records.iter().map(|r| r.order).collect();
    assert_eq!(orders.len(), 4);
    for pair in records.windows(2) {
        assert!(pair[0].order < pair[1].order);
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

/// Scenario: four creators start with parentless events. All four are
/// round 1 witnesses, and once enough later events arrive each of them
/// gets a distinct order with increasing timestamps.
#[test]
fn independent_genesis_events_all_reach_consensus() {
    let generator = DagGenerator::round_robin(4).with_independent_genesis();
    assert_ordered(&first_four_records(generator));
}

/// Same as above, but each first event after the very first already links
/// to the previous creator's event.
#[test]
fn chained_genesis_events_all_reach_consensus() {
    let generator = DagGenerator::round_robin(4);
    assert_ordered(&first_four_records(generator));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Two engines fed the same DAG decide the same fame for every witness
    /// and the same order for every event.
    #[test]
    fn replay_decides_identically(
        members in 3usize..6,
        dag_seed in any::<u64>(),
        count in 40usize..160,
    ) {
        let mut generator = DagGenerator::seeded(members, dag_seed);
        let events = generator.generate(count);
        let mut first = ConsensusEngine::new(generator.roster(), ConsensusConfig::default());
        let mut second = ConsensusEngine::new(generator.roster(), ConsensusConfig::default());
        for event in &events {
            let a = first.add_event(Arc::new(event.clone())).unwrap();
            let b = second.add_event(Arc::new(event.clone())).unwrap();
            prop_assert_eq!(a, b);
        }

        prop_assert_eq!(first.last_decided_round(), second.last_decided_round());
        for round in 1..=first.max_round() {
            for witness in first.witnesses(round) {
                prop_assert_eq!(first.is_famous(&witness.hash), second.is_famous(&witness.hash));
            }
        }
    }

    /// Every node sees the same DAG in a different topological order and
    /// must produce the same consensus.
    #[test]
    fn order_is_independent_of_delivery(
        members in 3usize..6,
        dag_seed in any::<u64>(),
        shuffle_seed in any::<u64>(),
        count in 40usize..160,
    ) {
        let mut generator = DagGenerator::seeded(members, dag_seed);
        let events = generator.generate(count);
        let reordered = shuffle_topologically(&events, shuffle_seed);
        prop_assert_eq!(reordered.len(), events.len());

        let a = run(&events, ConsensusConfig::default(), generator.roster());
        let b = run(&reordered, ConsensusConfig::default(), generator.roster());
        let common = a.len().min(b.len());
        prop_assert_eq!(&a[..common], &b[..common]);
    }

    /// Orders are dense from zero, timestamps strictly increase and no
    /// event is ordered twice.
    #[test]
    fn order_is_gap_free_and_monotonic(
        members in 3usize..7,
        dag_seed in any::<u64>(),
        count in 50usize..250,
        window in 2u64..8,
    ) {
        let mut generator = DagGenerator::seeded(members, dag_seed);
        let events = generator.generate(count);
        let config = ConsensusConfig {
            rounds_non_ancient: window,
            ..ConsensusConfig::default()
        };
        let records = run(&events, config, generator.roster());

        let mut hashes = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            prop_assert_eq!(record.order, i as u64);
            prop_assert!(hashes.insert(record.event.hash));
            if i > 0 {
                prop_assert!(record.timestamp > records[i - 1].timestamp);
                prop_assert!(record.round_received >= records[i - 1].round_received);
            }
        }
    }
}
