use crate::errors::AmuxError;
use crate::index::IndexError;
use crate::semaphore::SemaphoreError;
use amux_protocol::vcs::VcsError;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace name '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("workspace '{id}' not found")]
    NotFound { id: String },

    #[error("workspace '{id}' is in use by: {holders:?}")]
    InUse { id: String, holders: Vec<String> },

    #[error("current directory is inside the worktree being removed")]
    CurrentDirInsideWorktree,

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse workspace metadata at '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl AmuxError for WorkspaceError {
    fn error_code(&self) -> &'static str {
        match self {
            WorkspaceError::AlreadyExists { .. } => "ALREADY_EXISTS",
            WorkspaceError::NotFound { .. } => "NOT_FOUND",
            WorkspaceError::InUse { .. } => "IN_USE",
            WorkspaceError::CurrentDirInsideWorktree => "INVALID_INPUT",
            WorkspaceError::Vcs(e) => e.error_code(),
            WorkspaceError::Index(e) => e.error_code(),
            WorkspaceError::Semaphore(e) => e.error_code(),
            WorkspaceError::Io(_) => "OPERATION_FAILED",
            WorkspaceError::ParseError { .. } => "OPERATION_FAILED",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            WorkspaceError::AlreadyExists { .. }
                | WorkspaceError::NotFound { .. }
                | WorkspaceError::InUse { .. }
                | WorkspaceError::CurrentDirInsideWorktree
        )
    }
}
