//! Per-session status file: `sessions/<id>/status.yaml`, overwritten per run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Exited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyStatus {
    pub run_id: u64,
    pub pid: u32,
    pub status: RunState,
    /// `-1` while running; `0` on normal exit; the exit code otherwise;
    /// `-1` for non-exit errors (signal termination, spawn failure).
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl ProxyStatus {
    pub fn started(run_id: u64, pid: u32) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            pid,
            status: RunState::Running,
            exit_code: -1,
            started_at: now,
            ended_at: None,
            last_activity_at: Some(now),
        }
    }

    pub fn touch_activity(&mut self) {
        self.last_activity_at = Some(Utc::now());
    }

    pub fn mark_exited(&mut self, exit_code: i32) {
        self.status = RunState::Exited;
        self.exit_code = exit_code;
        self.ended_at = Some(Utc::now());
    }
}

/// Read `status.yaml` for a session, returning `None` if it does not yet
/// exist (first run).
pub fn read_status(status_path: &Path) -> Option<ProxyStatus> {
    let content = fs::read_to_string(status_path).ok()?;
    serde_yaml::from_str(&content).ok()
}

/// The next `run_id` for a session: one past the highest run_id recorded in
/// the existing status file, or `1` if there is none yet.
pub fn next_run_id(status_path: &Path) -> u64 {
    read_status(status_path).map(|s| s.run_id + 1).unwrap_or(1)
}

/// Write the status file atomically (write `<path>.tmp`, rename over `path`).
pub fn write_status(status_path: &Path, status: &ProxyStatus) -> Result<(), ProxyError> {
    if let Some(parent) = status_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(status).map_err(|e| ProxyError::StatusWriteFailed {
        path: status_path.display().to_string(),
        message: e.to_string(),
    })?;
    let tmp_path = tmp_path_for(status_path);
    if let Err(e) = fs::write(&tmp_path, &yaml) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, status_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
