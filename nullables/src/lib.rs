//! Nullable infrastructure for deterministic testing.
//!
//! Every boundary the consensus core talks to (clock, gossip, consensus
//! output, platform status) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what the core sent so tests can assert on it
//!
//! [`DagGenerator`] builds valid, signed event DAGs for a small roster.
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod dag;
pub mod gossip;
pub mod sink;
pub mod status;

pub use clock::NullClock;
pub use dag::{DagGenerator, ParentChoice};
pub use gossip::RecordingGossip;
pub use sink::RecordingSink;
pub use status::StaticStatus;
