use crate::errors::AmuxError;
use crate::runtime::RuntimeError;
use crate::workspace::WorkspaceError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("session '{id}' not found")]
    NotFound { id: String },

    #[error("cannot transition session '{id}' from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: crate::session::types::SessionState,
        to: crate::session::types::SessionState,
    },

    #[error("session '{id}' is already in state {state:?}")]
    AlreadyInState {
        id: String,
        state: crate::session::types::SessionState,
    },

    #[error("operation not supported for this session's runtime")]
    NotSupported,

    #[error("session '{id}' is not running")]
    NotRunning { id: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Index(#[from] crate::index::IndexError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl AmuxError for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            SessionError::InvalidInput { .. } => "INVALID_INPUT",
            SessionError::NotFound { .. } => "NOT_FOUND",
            SessionError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SessionError::AlreadyInState { .. } => "ALREADY_IN_STATE",
            SessionError::NotSupported => "NOT_SUPPORTED",
            SessionError::NotRunning { .. } => "NOT_RUNNING",
            SessionError::Runtime(e) => e.error_code(),
            SessionError::Workspace(e) => e.error_code(),
            SessionError::Index(e) => e.error_code(),
            SessionError::Io(_) => "OPERATION_FAILED",
            SessionError::ParseError { .. } => "OPERATION_FAILED",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidInput { .. }
                | SessionError::NotFound { .. }
                | SessionError::InvalidTransition { .. }
                | SessionError::AlreadyInState { .. }
                | SessionError::NotSupported
                | SessionError::NotRunning { .. }
        )
    }
}
