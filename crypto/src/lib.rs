//! Cryptographic capabilities consumed by the consensus core.
//!
//! Ed25519 keys sign event hashes. The event creator and intake only see
//! the narrow [`EventSigner`] and [`SignatureVerifier`] traits, so neither
//! touches a primitive directly.

pub mod keys;
pub mod signer;

pub use keys::{generate_keypair, keypair_from_seed};
pub use signer::{
    sign_message, verify_signature, Ed25519Signer, Ed25519Verifier, EventSigner,
    SignatureVerifier,
};
