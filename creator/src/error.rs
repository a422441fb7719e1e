use thiserror::Error;
use weft_types::CreatorId;
use weft_wire::WireError;

#[derive(Debug, Error)]
pub enum CreatorError {
    #[error("creator {0} is not in the roster")]
    NotInRoster(CreatorId),

    #[error("routing created event failed: {0}")]
    Routing(#[from] WireError),
}
