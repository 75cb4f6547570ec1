use std::collections::HashMap;
use std::path::PathBuf;

use amux_protocol::types::{SessionId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle state (spec §4.5). `Working` is a sub-state of
/// `Running` used by tmux-style supervision to report "output changed this
/// cycle" without inventing a parallel state dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Starting,
    Running,
    Working,
    Stopping,
    Stopped,
    Failed,
    Completed,
    Orphaned,
    Unknown,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Stopped
                | SessionState::Failed
                | SessionState::Completed
                | SessionState::Orphaned
        )
    }
}

/// Persisted session record (`sessions/<id>/status.yaml`'s C6 counterpart —
/// note C3's own `status.yaml` is the I/O proxy's per-run file; this is the
/// session manager's own metadata file, `session.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub index: String,
    pub workspace_id: Option<WorkspaceId>,
    pub task_name: Option<String>,
    pub command: Option<Vec<String>>,
    pub runtime: String,
    pub environment: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub runtime_options: HashMap<String, String>,
    pub auto_created_workspace: bool,
    pub metadata: HashMap<String, String>,
    pub state: SessionState,
    pub exit_code: Option<i32>,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_output_hash: Option<u64>,
    pub last_output_at: Option<DateTime<Utc>>,
    pub last_status_check: Option<DateTime<Utc>>,
}
