use thiserror::Error;
use weft_types::EventDescriptor;

/// Why an event was refused by intake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum RejectReason {
    #[error("creator is not in the roster")]
    UnknownCreator,

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("declared hash does not match content")]
    HashMismatch,

    #[error("self-parent belongs to a different creator")]
    SelfParentCreatorMismatch,

    #[error("other-parent belongs to the same creator")]
    OtherParentSameCreator,

    #[error("sequence number does not follow the self-parent")]
    SequenceMismatch,

    #[error("creator already produced a different event at this sequence")]
    Equivocation,

    #[error("parent descriptor does not match the known parent")]
    ParentMismatch,

    #[error("declared parent generation does not match the known parent")]
    GenerationMismatch,

    #[error("created earlier than the self-parent")]
    CreationTimeRegression,

    #[error("event is below the ancient threshold")]
    Ancient,

    #[error("orphan buffer is full")]
    BufferFull,
}

impl RejectReason {
    /// Short label, used as a metrics dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCreator => "unknown_creator",
            Self::InvalidSignature => "invalid_signature",
            Self::HashMismatch => "hash_mismatch",
            Self::SelfParentCreatorMismatch => "self_parent_creator_mismatch",
            Self::OtherParentSameCreator => "other_parent_same_creator",
            Self::SequenceMismatch => "sequence_mismatch",
            Self::Equivocation => "equivocation",
            Self::ParentMismatch => "parent_mismatch",
            Self::GenerationMismatch => "generation_mismatch",
            Self::CreationTimeRegression => "creation_time_regression",
            Self::Ancient => "ancient",
            Self::BufferFull => "buffer_full",
        }
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("event {event} rejected: {reason}")]
    Rejected {
        event: EventDescriptor,
        reason: RejectReason,
    },
}

impl IntakeError {
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::Rejected { reason, .. } => *reason,
        }
    }
}
