//! Workspace metadata and derived health (spec §3, "Workspace").

use amux_protocol::types::{BranchName, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyStatus {
    Consistent,
    FolderMissing,
    WorktreeMissing,
    BothMissing,
}

impl ConsistencyStatus {
    pub fn derive(path_exists: bool, worktree_exists: bool) -> Self {
        match (path_exists, worktree_exists) {
            (true, true) => ConsistencyStatus::Consistent,
            (true, false) => ConsistencyStatus::WorktreeMissing,
            (false, true) => ConsistencyStatus::FolderMissing,
            (false, false) => ConsistencyStatus::BothMissing,
        }
    }
}

/// Persisted workspace metadata (`workspace.yaml`). Health attributes
/// (`pathExists`, `worktreeExists`, consistency status) are derived at read
/// time, not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    pub id: WorkspaceId,
    pub index: String,
    pub name: String,
    pub description: String,
    pub base_branch: BranchName,
    pub working_branch: BranchName,
    pub worktree_path: PathBuf,
    pub storage_path: PathBuf,
    pub auto_created: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A workspace as returned to callers: persisted metadata plus derived
/// health, computed fresh on every `Get`/`List`.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub metadata: WorkspaceMetadata,
    pub path_exists: bool,
    pub worktree_exists: bool,
    pub consistency: ConsistencyStatus,
}

impl Workspace {
    pub fn from_metadata(metadata: WorkspaceMetadata, path_exists: bool, worktree_exists: bool) -> Self {
        let consistency = ConsistencyStatus::derive(path_exists, worktree_exists);
        Self {
            metadata,
            path_exists,
            worktree_exists,
            consistency,
        }
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.metadata.id
    }

    pub fn worktree_path(&self) -> &Path {
        &self.metadata.worktree_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_status_derivation_matches_truth_table() {
        assert_eq!(ConsistencyStatus::derive(true, true), ConsistencyStatus::Consistent);
        assert_eq!(ConsistencyStatus::derive(true, false), ConsistencyStatus::WorktreeMissing);
        assert_eq!(ConsistencyStatus::derive(false, true), ConsistencyStatus::FolderMissing);
        assert_eq!(ConsistencyStatus::derive(false, false), ConsistencyStatus::BothMissing);
    }
}
