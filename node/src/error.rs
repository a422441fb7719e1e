use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("config error: {0}")]
    Config(String),

    #[error("wire error: {0}")]
    Wire(#[from] weft_wire::WireError),

    #[error("creator error: {0}")]
    Creator(#[from] weft_creator::CreatorError),

    #[error("consensus error: {0}")]
    Consensus(#[from] weft_consensus::ConsensusError),

    #[error("intake error: {0}")]
    Intake(#[from] weft_intake::IntakeError),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("platform has halted")]
    Halted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
