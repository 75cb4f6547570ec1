use crate::errors::AmuxError;

#[derive(Debug, thiserror::Error)]
pub enum SemaphoreError {
    #[error("holder '{id}' already holds this semaphore")]
    AlreadyHeld { id: String },

    #[error("semaphore has no available capacity")]
    NoCapacity,

    #[error("holder '{id}' does not hold this semaphore")]
    NotHeld { id: String },

    #[error("failed to parse semaphore state at '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("failed to acquire lock on semaphore state: {message}")]
    LockError { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AmuxError for SemaphoreError {
    fn error_code(&self) -> &'static str {
        match self {
            SemaphoreError::AlreadyHeld { .. } => "ALREADY_HELD",
            SemaphoreError::NoCapacity => "NO_CAPACITY",
            SemaphoreError::NotHeld { .. } => "NOT_HELD",
            SemaphoreError::ParseError { .. } => "PARSE_ERROR",
            SemaphoreError::LockError { .. } => "LOCK_ERROR",
            SemaphoreError::Io(_) => "IO_ERROR",
        }
    }
}
