use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_consensus::{ConsensusConfig, ConsensusEngine};
use weft_nullables::DagGenerator;

fn add_events_round_robin_bench(c: &mut Criterion) {
    let mut generator = DagGenerator::round_robin(7);
    let roster = generator.roster();
    let events: Vec<_> = generator.generate(1_000).into_iter().map(Arc::new).collect();

    c.bench_function("consensus_round_robin_7x1000", |b| {
        b.iter(|| {
            let mut engine = ConsensusEngine::new(Arc::clone(&roster), ConsensusConfig::default());
            for event in &events {
                black_box(engine.add_event(Arc::clone(event)).unwrap());
            }
        })
    });
}

fn add_events_random_bench(c: &mut Criterion) {
    let mut generator = DagGenerator::seeded(10, 7);
    let roster = generator.roster();
    let events: Vec<_> = generator.generate(1_000).into_iter().map(Arc::new).collect();

    c.bench_function("consensus_seeded_10x1000", |b| {
        b.iter(|| {
            let mut engine = ConsensusEngine::new(Arc::clone(&roster), ConsensusConfig::default());
            for event in &events {
                black_box(engine.add_event(Arc::clone(event)).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    add_events_round_robin_bench,
    add_events_random_bench
);
criterion_main!(benches);
