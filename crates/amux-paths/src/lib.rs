use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("project root not found — run inside a directory containing .amux/, or set $AMUX_DIR")]
    RootNotFound,
}

/// Centralized path construction for the per-project `.amux/` directory layout.
///
/// Single source of truth for every path under `.amux/`. Use `resolve()` in
/// production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct AmuxPaths {
    amux_dir: PathBuf,
}

impl AmuxPaths {
    /// Resolve `.amux/` from `$AMUX_DIR` if set, otherwise by walking up from
    /// the current directory looking for an existing `.amux/` directory.
    pub fn resolve() -> Result<Self, PathError> {
        if let Ok(dir) = env::var("AMUX_DIR") {
            return Ok(Self {
                amux_dir: PathBuf::from(dir),
            });
        }

        let cwd = env::current_dir().map_err(|_| PathError::RootNotFound)?;
        let mut dir = cwd.as_path();
        loop {
            let candidate = dir.join(".amux");
            if candidate.is_dir() {
                return Ok(Self { amux_dir: candidate });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(PathError::RootNotFound),
            }
        }
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(amux_dir: PathBuf) -> Self {
        Self { amux_dir }
    }

    /// The base `.amux` directory.
    pub fn amux_dir(&self) -> &Path {
        &self.amux_dir
    }

    // --- Top-level files ---

    pub fn config_file(&self) -> PathBuf {
        self.amux_dir.join("config.toml")
    }

    // --- Index (C1) ---

    pub fn index_dir(&self) -> PathBuf {
        self.amux_dir.join("index")
    }

    pub fn index_state_file(&self) -> PathBuf {
        self.index_dir().join("state.yaml")
    }

    pub fn index_lock_file(&self) -> PathBuf {
        self.index_dir().join("state.yaml.lock")
    }

    // --- Workspaces (C5) ---

    pub fn workspaces_dir(&self) -> PathBuf {
        self.amux_dir.join("workspaces")
    }

    pub fn workspace_dir(&self, workspace_id: &str) -> PathBuf {
        self.workspaces_dir().join(workspace_id)
    }

    pub fn workspace_metadata_file(&self, workspace_id: &str) -> PathBuf {
        self.workspace_dir(workspace_id).join("workspace.yaml")
    }

    pub fn workspace_worktree_dir(&self, workspace_id: &str) -> PathBuf {
        self.workspace_dir(workspace_id).join("worktree")
    }

    pub fn workspace_storage_dir(&self, workspace_id: &str) -> PathBuf {
        self.workspace_dir(workspace_id).join("storage")
    }

    pub fn workspace_semaphore_file(&self, workspace_id: &str) -> PathBuf {
        self.workspace_dir(workspace_id).join("semaphore.json")
    }

    pub fn workspace_semaphore_lock_file(&self, workspace_id: &str) -> PathBuf {
        self.workspace_dir(workspace_id).join("semaphore.json.lock")
    }

    // --- Sessions (C6 / C3) ---

    pub fn sessions_dir(&self) -> PathBuf {
        self.amux_dir.join("sessions")
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id)
    }

    pub fn session_status_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("status.yaml")
    }

    /// Session manager's own persisted record, distinct from the I/O
    /// proxy's per-session `status.yaml` above.
    pub fn session_metadata_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("session.yaml")
    }

    pub fn session_run_dir(&self, session_id: &str, run_id: u64) -> PathBuf {
        self.session_dir(session_id).join(run_id.to_string())
    }

    pub fn session_run_log_file(&self, session_id: &str, run_id: u64) -> PathBuf {
        self.session_run_dir(session_id, run_id).join("console.log")
    }

    pub fn session_socket_file(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("broadcast.sock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dir_roundtrips_subpaths() {
        let paths = AmuxPaths::from_dir(PathBuf::from("/tmp/proj/.amux"));
        assert_eq!(
            paths.index_state_file(),
            PathBuf::from("/tmp/proj/.amux/index/state.yaml")
        );
        assert_eq!(
            paths.workspace_worktree_dir("ws-1"),
            PathBuf::from("/tmp/proj/.amux/workspaces/ws-1/worktree")
        );
        assert_eq!(
            paths.session_run_log_file("session-3", 2),
            PathBuf::from("/tmp/proj/.amux/sessions/session-3/2/console.log")
        );
        assert_ne!(
            paths.session_status_file("session-3"),
            paths.session_metadata_file("session-3")
        );
    }

    #[test]
    fn resolve_respects_amux_dir_env() {
        let dir = tempfile::tempdir().unwrap();
        let amux = dir.path().join(".amux");
        // SAFETY: test-only, single-threaded access to this env var.
        unsafe {
            env::set_var("AMUX_DIR", &amux);
        }
        let paths = AmuxPaths::resolve().unwrap();
        assert_eq!(paths.amux_dir(), amux);
        unsafe {
            env::remove_var("AMUX_DIR");
        }
    }

    #[test]
    fn resolve_without_amux_dir_or_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            env::remove_var("AMUX_DIR");
        }
        let original = env::current_dir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        let result = AmuxPaths::resolve();
        env::set_current_dir(original).unwrap();
        assert!(matches!(result, Err(PathError::RootNotFound)));
    }
}
