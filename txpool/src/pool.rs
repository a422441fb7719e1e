use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, trace};
use weft_types::Transaction;

use crate::config::TxPoolConfig;

struct PoolState {
    pending: VecDeque<Transaction>,
    pending_bytes: usize,
}

/// FIFO buffer of transactions awaiting inclusion in an event.
pub struct TransactionPool {
    config: TxPoolConfig,
    state: Mutex<PoolState>,
}

impl TransactionPool {
    pub fn new(config: TxPoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                pending: VecDeque::new(),
                pending_bytes: 0,
            }),
        }
    }

    pub fn config(&self) -> &TxPoolConfig {
        &self.config
    }

    /// Queue a transaction. Returns `false` if it is empty, larger than
    /// `max_transaction_bytes`, or the pool is full.
    pub fn submit(&self, tx: Transaction) -> bool {
        let size = tx.size();
        if size == 0 || size > self.config.max_transaction_bytes {
            debug!(size, max = self.config.max_transaction_bytes, "transaction rejected: bad size");
            return false;
        }

        let mut state = self.state.lock();
        if state.pending.len() >= self.config.capacity {
            debug!(capacity = self.config.capacity, "transaction rejected: pool full");
            return false;
        }
        state.pending_bytes += size;
        state.pending.push_back(tx);
        trace!(size, pending = state.pending.len(), "transaction queued");
        true
    }

    /// Remove transactions in arrival order while their total size fits in
    /// `max_bytes`. Stops at the first transaction that does not fit so later,
    /// smaller transactions never overtake it.
    pub fn drain(&self, max_bytes: usize) -> Vec<Transaction> {
        let mut state = self.state.lock();
        let mut taken = Vec::new();
        let mut used = 0usize;

        while let Some(front) = state.pending.front() {
            let size = front.size();
            if used + size > max_bytes {
                break;
            }
            used += size;
            if let Some(tx) = state.pending.pop_front() {
                taken.push(tx);
            }
        }
        state.pending_bytes -= used;

        if !taken.is_empty() {
            trace!(count = taken.len(), bytes = used, "transactions drained");
        }
        taken
    }

    /// Drop every pending transaction, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.pending_bytes = 0;
        if dropped > 0 {
            debug!(dropped, "transaction pool cleared");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_pending(&self) -> bool {
        !self.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.state.lock().pending_bytes
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new(TxPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tx(size: usize) -> Transaction {
        Transaction::new(vec![0xAB; size])
    }

    fn pool(capacity: usize) -> TransactionPool {
        TransactionPool::new(TxPoolConfig {
            capacity,
            max_transaction_bytes: 1024,
        })
    }

    #[test]
    fn drain_stops_at_first_transaction_that_does_not_fit() {
        let pool = pool(10);
        assert!(pool.submit(tx(10)));
        assert!(pool.submit(tx(20)));
        assert!(pool.submit(tx(30)));

        let drained = pool.drain(25);
        assert_eq!(drained.iter().map(Transaction::size).collect::<Vec<_>>(), vec![10]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.pending_bytes(), 50);

        let drained = pool.drain(100);
        assert_eq!(drained.iter().map(Transaction::size).collect::<Vec<_>>(), vec![20, 30]);
        assert!(!pool.has_pending());
        assert_eq!(pool.pending_bytes(), 0);
    }

    #[test]
    fn rejects_when_full_or_badly_sized() {
        let pool = pool(2);
        assert!(!pool.submit(Transaction::new(Vec::new())));
        assert!(!pool.submit(tx(1025)));
        assert!(pool.submit(tx(1024)));
        assert!(pool.submit(tx(1)));
        assert!(!pool.submit(tx(1)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn zero_budget_drains_nothing() {
        let pool = pool(4);
        pool.submit(tx(3));
        assert!(pool.drain(0).is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn clear_empties_pool() {
        let pool = pool(4);
        pool.submit(tx(3));
        pool.submit(tx(4));
        assert_eq!(pool.clear(), 2);
        assert!(pool.is_empty());
        assert_eq!(pool.pending_bytes(), 0);
        assert!(pool.submit(tx(3)));
    }

    #[test]
    fn concurrent_submitters_never_exceed_capacity() {
        let pool = Arc::new(pool(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || (0..50).filter(|_| pool.submit(tx(8))).count())
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 100);
        assert_eq!(pool.len(), 100);
        assert_eq!(pool.pending_bytes(), 800);
    }
}
