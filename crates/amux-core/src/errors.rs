use std::error::Error;

/// Base trait for all amux-core errors, mirroring the teacher's `KildError`.
pub trait AmuxError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling (spec §7 categories).
    fn error_code(&self) -> &'static str;

    /// Whether this error should be logged as a warning rather than an error.
    fn is_user_error(&self) -> bool {
        false
    }
}
