//! Signing capabilities handed to the event creator and intake.
//!
//! Events are signed over their 32-byte hash, never over the full content.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use weft_types::{CreatorId, KeyPair, PrivateKey, PublicKey, Signature};

use crate::keys::generate_keypair;

/// Signs the hashes of events created by this node.
pub trait EventSigner: Send + Sync {
    /// The roster identity whose key this signer holds.
    fn creator(&self) -> CreatorId;

    fn sign(&self, bytes: &[u8]) -> Signature;
}

/// Verifies signatures of events received from any creator.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &PublicKey, bytes: &[u8], signature: &Signature) -> bool;
}

pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    Signature(SigningKey::from_bytes(&private_key.0).sign(message).to_bytes())
}

/// `false` for a malformed public key as well as a bad signature.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    key.verify(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
        .is_ok()
}

/// Ed25519 signer backed by a local key pair.
pub struct Ed25519Signer {
    creator: CreatorId,
    keypair: KeyPair,
}

impl Ed25519Signer {
    pub fn new(creator: CreatorId, keypair: KeyPair) -> Self {
        Self { creator, keypair }
    }

    /// A signer with a freshly generated key, for a member joining a new roster.
    pub fn generate(creator: CreatorId) -> Self {
        Self::new(creator, generate_keypair())
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }
}

impl EventSigner for Ed25519Signer {
    fn creator(&self) -> CreatorId {
        self.creator
    }

    fn sign(&self, bytes: &[u8]) -> Signature {
        sign_message(bytes, &self.keypair.private)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &PublicKey, bytes: &[u8], signature: &Signature) -> bool {
        verify_signature(bytes, signature, public_key)
    }
}
