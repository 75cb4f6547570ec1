//! amux-protocol: shared newtypes and the VCS adapter boundary.
//!
//! Every cross-crate type that needs to be agreed on by both `amux-core`
//! and its callers lives here, mirroring how `kild-protocol` is the shared
//! vocabulary between `kild-core` and `kild-daemon`.

pub mod types;
pub mod vcs;

pub use types::{BranchName, EntityKind, HolderId, SessionId, WorkspaceId};
pub use vcs::{Vcs, VcsError, WorktreeEntry};
