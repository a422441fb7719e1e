use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use weft_crypto::Ed25519Verifier;
use weft_intake::{EventValidator, IntakeConfig, IntakeOutcome, OrphanBuffer};
use weft_nullables::DagGenerator;
use weft_types::EventHash;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the delivery order, every event is admitted exactly once and
    /// never before its parents.
    #[test]
    fn admission_is_topological(
        members in 2usize..7,
        dag_seed in any::<u64>(),
        shuffle_seed in any::<u64>(),
        count in 1usize..60,
    ) {
        let mut generator = DagGenerator::seeded(members, dag_seed);
        let mut events = generator.generate(count);
        events.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));

        let mut buffer = OrphanBuffer::new(
            IntakeConfig::default(),
            EventValidator::new(generator.roster(), Arc::new(Ed25519Verifier)),
        );

        let mut position: HashMap<EventHash, usize> = HashMap::new();
        let mut admitted = Vec::new();
        for event in events {
            let outcome = buffer.submit(Arc::new(event)).unwrap();
            prop_assert!(!matches!(outcome, IntakeOutcome::Duplicate));
            for event in outcome.admitted() {
                prop_assert!(position.insert(event.hash(), admitted.len()).is_none());
                admitted.push(Arc::clone(event));
            }
        }

        prop_assert_eq!(admitted.len(), count);
        prop_assert_eq!(buffer.orphan_count(), 0);
        for event in &admitted {
            for parent in event.content().parents() {
                prop_assert!(position[&parent.hash] < position[&event.hash()]);
            }
        }
    }
}
