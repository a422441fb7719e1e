//! Fundamental types for the weft consensus core.
//!
//! This crate defines the data model shared by every other crate in the workspace:
//! events and their parent descriptors, creator identities and the stake roster,
//! timestamps, signatures, consensus output records, the platform status, and
//! the traits through which the core talks to gossip, state application and
//! the status service.

pub mod consensus;
pub mod error;
pub mod event;
pub mod hash;
pub mod interfaces;
pub mod keys;
pub mod roster;
pub mod status;
pub mod time;
pub mod transaction;

pub use consensus::{ConsensusRecord, ConsensusRound};
pub use error::TypesError;
pub use event::{CreatorId, Event, EventContent, EventDescriptor};
pub use hash::EventHash;
pub use interfaces::{ConsensusSink, Gossip, StatusProvider};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use roster::{Roster, RosterEntry};
pub use status::PlatformStatus;
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::Transaction;
