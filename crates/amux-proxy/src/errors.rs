#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid command: {message}")]
    InvalidCommand { message: String },

    #[error("failed to spawn command: {source}")]
    SpawnFailed { source: std::io::Error },

    #[error("failed to write status file at '{path}': {message}")]
    StatusWriteFailed { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
