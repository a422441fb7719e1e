use proptest::prelude::*;

use weft_txpool::{TransactionPool, TxPoolConfig};
use weft_types::Transaction;

proptest! {
    /// Draining hands out every transaction exactly once, in submission order,
    /// and never exceeds the byte budget.
    #[test]
    fn drain_is_fifo_and_exactly_once(
        sizes in prop::collection::vec(1usize..64, 0..40),
        budget in 1usize..200,
    ) {
        let pool = TransactionPool::new(TxPoolConfig { capacity: 1_000, max_transaction_bytes: 64 });
        for (i, size) in sizes.iter().enumerate() {
            let mut payload = vec![0u8; *size];
            payload[0] = i as u8;
            prop_assert!(pool.submit(Transaction::new(payload)));
        }

        let mut out = Vec::new();
        loop {
            let batch = pool.drain(budget);
            prop_assert!(batch.iter().map(Transaction::size).sum::<usize>() <= budget);
            if batch.is_empty() {
                break;
            }
            out.extend(batch);
        }

        // Everything that fits in a single budget comes out; anything larger stays.
        let expected: Vec<usize> = sizes.iter().copied().take_while(|s| *s <= budget).collect();
        prop_assert_eq!(out.iter().map(Transaction::size).collect::<Vec<_>>(), expected.clone());
        for (i, tx) in out.iter().enumerate() {
            prop_assert_eq!(tx.as_bytes()[0], i as u8);
        }
        prop_assert_eq!(pool.len(), sizes.len() - expected.len());
    }
}
