//! Consensus: total ordering of the event DAG via virtual voting.
//!
//! - Every event gets a round. An event starts a new round when it strongly
//!   sees witnesses of its parents' round holding a stake supermajority.
//! - The first event of each creator in a round is a witness.
//! - Later witnesses vote on the fame of earlier ones without any messages
//!   being exchanged. Coin rounds break deadlocks.
//! - Once a round's fame is decided, its famous witnesses (judges) receive
//!   every event most of them see. Received events are ordered by median
//!   first-sighting time with a signature-based tie-break.
//!
//! ## Module overview
//!
//! - [`engine`]: [`ConsensusEngine`], the single entry point.
//! - [`arena`]: Index-addressed DAG store with ancestry queries.
//! - [`round`]: Per-round witness lists and lifecycle.
//! - [`config`]: Algorithm tunables.
//! - [`error`]: Fatal consistency violations.

pub mod arena;
pub mod config;
pub mod engine;
pub mod error;
mod ordering;
pub mod round;
mod voting;

pub use arena::{EventArena, EventNode, NodeIndex};
pub use config::ConsensusConfig;
pub use engine::ConsensusEngine;
pub use error::{ConsensusError, FatalError};
pub use round::RoundState;
