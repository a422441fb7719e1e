//! Boundaries between the consensus core and the rest of the node.
//!
//! The core calls out through these traits and never reaches for the
//! network, the state machine or the status service directly.

use crate::consensus::ConsensusRound;
use crate::event::Event;
use crate::status::PlatformStatus;

/// Outbound gossip. Best effort; the core does not wait for delivery.
pub trait Gossip: Send + Sync {
    fn broadcast_event(&self, event: &Event);
}

/// Receives decided rounds in strict order, gap-free and with increasing timestamps.
pub trait ConsensusSink: Send + Sync {
    fn on_consensus_round(&self, round: &ConsensusRound);
}

/// Supplies the node's operational status.
pub trait StatusProvider: Send + Sync {
    fn platform_status(&self) -> PlatformStatus;
}
