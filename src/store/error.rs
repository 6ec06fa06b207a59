use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("conflicting job already {0:?} for this request/kind")]
    JobAlreadyActive(crate::domain::JobState),

    #[error("job {0} is not in the expected state for this transition")]
    UnexpectedJobState(String),

    #[error("slug already claimed: {0}")]
    SlugCollision(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
