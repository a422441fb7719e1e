//! Event hash type for the gossiped DAG.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte event hash: identifies an event in the hashgraph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventHash([u8; 32]);

impl Default for EventHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl EventHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Short hex prefix used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHash({}\u{2026})", self.short())
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_default() {
        assert!(EventHash::default().is_zero());
        assert!(!EventHash::new([1; 32]).is_zero());
    }

    #[test]
    fn display_is_full_hex() {
        let h = EventHash::new([0xab; 32]);
        assert_eq!(h.to_string().len(), 64);
        assert!(h.to_string().starts_with("abab"));
        assert_eq!(h.short(), "abababab");
    }
}
