use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("already upvoted")]
    AlreadyVoted,
    #[error("conflict")]
    Conflict,
    #[error("store error: {0}")]
    Store(String),
}
