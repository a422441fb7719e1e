//! Transaction pool: the bounded buffer between transaction ingress and the
//! event creator.
//!
//! Any number of threads may call [`TransactionPool::submit`]; only the event
//! creator calls [`TransactionPool::drain`]. Submission never blocks: once
//! the pool is full it returns `false` and the caller decides whether to
//! retry or drop.

pub mod config;
pub mod pool;

pub use config::TxPoolConfig;
pub use pool::TransactionPool;
