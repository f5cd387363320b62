use thiserror::Error;

/// Failure of a single key-value backend call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store call timed out after {0}ms")]
    Timeout(u64),
    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure of the label/image hosting boundary.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("label encoding failed: {0}")]
    Encode(String),
    #[error("artifact write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("email already in use")]
    DuplicateEmail,
    #[error("incorrect password")]
    WrongPassword,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
