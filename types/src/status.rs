//! Platform operational status, supplied to the core by the host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of the hosting platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformStatus {
    /// Process is starting and has not loaded state.
    Starting,
    /// Observing the network before participating.
    Observing,
    /// Fully participating.
    Active,
    /// Participating while confirming its own events reach consensus.
    Checking,
    /// Fallen behind the network; must reconnect.
    Behind,
    /// Receiving state from a peer.
    Reconnecting,
    /// Freeze in progress; no new transactions.
    Freezing,
    /// Frozen for an upgrade.
    Frozen,
    /// Unrecoverable failure.
    CatastrophicFailure,
}

impl PlatformStatus {
    /// Whether events may be created in this status.
    pub fn permits_event_creation(&self) -> bool {
        matches!(self, Self::Active | Self::Checking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Observing => "observing",
            Self::Active => "active",
            Self::Checking => "checking",
            Self::Behind => "behind",
            Self::Reconnecting => "reconnecting",
            Self::Freezing => "freezing",
            Self::Frozen => "frozen",
            Self::CatastrophicFailure => "catastrophic_failure",
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
