//! Intake: validates incoming events and releases them in topological order.
//!
//! Events arrive from gossip and from the local creator in any order. The
//! [`OrphanBuffer`] holds an event until both of its parents have been
//! admitted (or have fallen below the ancient threshold), then admits it and
//! cascades to any buffered descendants. Consumers therefore never observe an
//! event before its parents.
//!
//! Malformed events are rejected with a [`RejectReason`] and never forwarded.

pub mod buffer;
pub mod config;
pub mod error;
pub mod validation;

pub use buffer::{IntakeOutcome, IntakeStats, OrphanBuffer, ThresholdUpdate};
pub use config::IntakeConfig;
pub use error::{IntakeError, RejectReason};
pub use validation::EventValidator;
