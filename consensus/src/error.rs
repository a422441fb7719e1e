use thiserror::Error;
use weft_types::{CreatorId, EventDescriptor, EventHash};

/// Internal consistency violations. Any of these halts the engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("event {event} references missing non-ancient parent {parent}")]
    MissingParent {
        event: EventDescriptor,
        parent: EventDescriptor,
    },

    #[error("event {hash} already present with different content")]
    ConflictingEvent { hash: EventHash },

    #[error("event {event} forks creator {creator}: slot already held by {existing}")]
    ForkedCreator {
        event: EventDescriptor,
        creator: CreatorId,
        existing: EventHash,
    },

    #[error("event {event} has a creator outside the roster")]
    UnknownCreator { event: EventDescriptor },
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("fatal consensus error: {0}")]
    Fatal(#[from] FatalError),

    #[error("consensus engine halted after: {0}")]
    Halted(FatalError),
}

impl ConsensusError {
    /// The violation behind this error.
    pub fn fatal(&self) -> &FatalError {
        match self {
            Self::Fatal(err) | Self::Halted(err) => err,
        }
    }
}
