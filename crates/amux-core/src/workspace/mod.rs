//! C5: workspace manager — branch-isolated working copies.

pub mod errors;
pub mod manager;
pub mod types;

pub use errors::WorkspaceError;
pub use manager::{CreateOptions, RemoveOptions, SessionStopper, WorkspaceManager};
pub use types::{ConsistencyStatus, Workspace, WorkspaceMetadata};
