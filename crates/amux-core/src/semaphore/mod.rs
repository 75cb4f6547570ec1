//! C2: file-backed counting semaphore guarding access to a workspace.

pub mod errors;
pub mod manager;
pub mod types;

pub use errors::SemaphoreError;
pub use manager::FileSemaphore;
pub use types::{Holder, SemaphoreState};
