use serde::{Deserialize, Serialize};

/// Transaction pool limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxPoolConfig {
    /// Maximum number of pending transactions.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Largest transaction the pool will accept, in bytes.
    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,
}

fn default_capacity() -> usize {
    100_000
}

fn default_max_transaction_bytes() -> usize {
    6 * 1024
}

impl Default for TxPoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_transaction_bytes: default_max_transaction_bytes(),
        }
    }
}
