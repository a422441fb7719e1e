use proptest::prelude::*;

use weft_types::{
    CreatorId, Event, EventContent, EventDescriptor, EventHash, Signature, Timestamp,
    Transaction,
};

fn descriptor(creator: u32, sequence: u64, generation: u64, seed: u8) -> EventDescriptor {
    EventDescriptor {
        hash: EventHash::new([seed; 32]),
        creator: CreatorId(creator),
        sequence,
        generation,
    }
}

proptest! {
    /// EventHash roundtrip: new -> as_bytes produces identical bytes.
    #[test]
    fn event_hash_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = EventHash::new(bytes);
        prop_assert_eq!(hash.as_bytes(), &bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Timestamp ordering follows the underlying nanoseconds.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::from_nanos(a);
        let tb = Timestamp::from_nanos(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Generation is one above the higher parent generation.
    #[test]
    fn generation_follows_parents(
        self_gen in proptest::option::of(0u64..1_000_000),
        other_gen in proptest::option::of(0u64..1_000_000),
    ) {
        let content = EventContent {
            creator: CreatorId(0),
            sequence: if self_gen.is_some() { 1 } else { 0 },
            self_parent: self_gen.map(|g| descriptor(0, 0, g, 1)),
            other_parent: other_gen.map(|g| descriptor(1, 4, g, 2)),
            created: Timestamp::from_secs(1),
            transactions: Vec::new(),
        };
        let expected = match (self_gen, other_gen) {
            (None, None) => 0,
            (a, b) => a.into_iter().chain(b).max().unwrap() + 1,
        };
        prop_assert_eq!(content.generation(), expected);
    }

    /// Any change to the transaction payload changes the event hash.
    #[test]
    fn payload_changes_hash(
        payload in prop::collection::vec(any::<u8>(), 0..64),
        extra in any::<u8>(),
    ) {
        let mut content = EventContent {
            creator: CreatorId(2),
            sequence: 0,
            self_parent: None,
            other_parent: None,
            created: Timestamp::from_millis(5),
            transactions: vec![Transaction::new(payload.clone())],
        };
        let before = Event::new(content.clone(), Signature::EMPTY).hash();
        let mut changed = payload;
        changed.push(extra);
        content.transactions = vec![Transaction::new(changed)];
        let after = Event::new(content, Signature::EMPTY).hash();
        prop_assert_ne!(before, after);
    }
}
