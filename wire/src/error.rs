use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("wire {wire} rejected a task: scheduler is shut down")]
    Shutdown { wire: String },

    #[error("a wire named {0} already exists")]
    DuplicateWire(String),

    #[error("wire {0} must have a capacity of at least 1")]
    InvalidCapacity(String),

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
