use crate::errors::AmuxError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to parse index state at '{path}': {message}")]
    ParseError { path: String, message: String },

    #[error("failed to acquire lock on index state: {message}")]
    LockError { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AmuxError for IndexError {
    fn error_code(&self) -> &'static str {
        match self {
            IndexError::ParseError { .. } => "PARSE_ERROR",
            IndexError::LockError { .. } => "LOCK_ERROR",
            IndexError::Io(_) => "IO_ERROR",
        }
    }
}
