use crate::errors::AmuxError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("runtime '{name}' is not registered")]
    NotFound { name: String },

    #[error("runtime '{name}' already registered")]
    AlreadyRegistered { name: String },

    #[error("runtime name must not be empty")]
    InvalidName,

    #[error("runtime '{name}' is not available: {message}")]
    NotAvailable { name: String, message: String },

    #[error("invalid command: {message}")]
    InvalidCommand { message: String },

    #[error("process already finished")]
    ProcessAlreadyDone,

    #[error("process is still running")]
    StillRunning,

    #[error("process '{id}' not found")]
    ProcessNotFound { id: String },

    #[error("operation not supported by this runtime/process")]
    NotSupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AmuxError for RuntimeError {
    fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::NotFound { .. } => "NOT_FOUND",
            RuntimeError::AlreadyRegistered { .. } => "ALREADY_EXISTS",
            RuntimeError::InvalidName => "INVALID_INPUT",
            RuntimeError::NotAvailable { .. } => "RUNTIME_NOT_AVAILABLE",
            RuntimeError::InvalidCommand { .. } => "INVALID_COMMAND",
            RuntimeError::ProcessAlreadyDone => "PROCESS_ALREADY_DONE",
            RuntimeError::StillRunning => "STILL_RUNNING",
            RuntimeError::ProcessNotFound { .. } => "NOT_FOUND",
            RuntimeError::NotSupported => "NOT_SUPPORTED",
            RuntimeError::Io(_) => "OPERATION_FAILED",
        }
    }
}
