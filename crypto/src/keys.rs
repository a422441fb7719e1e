//! Ed25519 key material for roster members.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use weft_types::{KeyPair, PrivateKey, PublicKey};

fn keypair_of(signing_key: &SigningKey) -> KeyPair {
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// A fresh key pair from the operating system's random source.
pub fn generate_keypair() -> KeyPair {
    keypair_of(&SigningKey::generate(&mut OsRng))
}

/// Deterministic key pair for a 32-byte seed. Test rosters are built this way.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_of(&SigningKey::from_bytes(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = generate_keypair();
        let b = generate_keypair();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn seeded_keys_are_stable() {
        let a = keypair_from_seed(&[42u8; 32]);
        assert_eq!(a.public, keypair_from_seed(&[42u8; 32]).public);
        assert_ne!(a.public, keypair_from_seed(&[43u8; 32]).public);
    }
}
