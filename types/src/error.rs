//! Errors raised while constructing core types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("roster has no members")]
    EmptyRoster,

    #[error("roster member {0} is listed more than once")]
    DuplicateCreator(u32),

    #[error("roster members must be numbered 0..n, found {found} at position {position}")]
    NonDenseCreatorIds { position: usize, found: u32 },

    #[error("roster total stake is zero")]
    ZeroTotalStake,
}
