//! Workspace manager (C5): lifecycle of branch-isolated working copies.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use amux_paths::AmuxPaths;
use amux_protocol::types::{BranchName, EntityKind, WorkspaceId};
use amux_protocol::vcs::Vcs;
use chrono::Utc;
use tracing::{info, warn};

use crate::atomic::write_atomic;
use crate::index::IndexManager;
use crate::semaphore::FileSemaphore;
use crate::workspace::errors::WorkspaceError;
use crate::workspace::types::{Workspace, WorkspaceMetadata};

const DEFAULT_SEMAPHORE_CAPACITY: u32 = 1;

/// Collaborator through which C5 asks C6 to stop sessions holding a
/// workspace before it is removed. Implemented by the session manager;
/// injected here to avoid a core-level dependency cycle (spec §4.6, "a
/// `SessionStopper` collaborator provided by C6 through dependency
/// injection").
pub trait SessionStopper: Send + Sync {
    /// Stop every session holding `workspace_id`. Best-effort when `force`
    /// is true: individual failures are logged, not propagated.
    fn stop_sessions_for_workspace(&self, workspace_id: &WorkspaceId, force: bool);
}

pub struct CreateOptions {
    pub name: String,
    pub base_branch: Option<String>,
    pub branch: Option<String>,
    pub description: String,
    pub auto_created: bool,
}

#[derive(Default)]
pub struct RemoveOptions {
    pub no_hooks: bool,
    pub current_dir: Option<std::path::PathBuf>,
    pub force: bool,
}

pub struct WorkspaceManager {
    paths: AmuxPaths,
    vcs: Arc<dyn Vcs>,
    index: Arc<IndexManager>,
    semaphores: Mutex<HashMap<String, Arc<FileSemaphore>>>,
    default_semaphore_capacity: u32,
}

impl WorkspaceManager {
    pub fn new(paths: AmuxPaths, vcs: Arc<dyn Vcs>, index: Arc<IndexManager>) -> Self {
        Self {
            paths,
            vcs,
            index,
            semaphores: Mutex::new(HashMap::new()),
            default_semaphore_capacity: DEFAULT_SEMAPHORE_CAPACITY,
        }
    }

    pub fn with_semaphore_capacity(mut self, capacity: u32) -> Self {
        self.default_semaphore_capacity = capacity;
        self
    }

    pub fn create(&self, opts: CreateOptions) -> Result<Workspace, WorkspaceError> {
        if self.find_by_name(&opts.name)?.is_some() {
            return Err(WorkspaceError::AlreadyExists { name: opts.name });
        }

        let workspace_id = WorkspaceId::new(opts.name.clone());
        let index = self.index.acquire(&EntityKind::Workspace, workspace_id.as_str())?;

        let working_branch = match opts.branch {
            Some(b) => BranchName::from(b.as_str()),
            None => BranchName::from(format!("amux/{}", workspace_id.as_str()).as_str()),
        };
        let base_branch = BranchName::from(opts.base_branch.as_deref().unwrap_or("main"));

        let worktree_path = self.paths.workspace_worktree_dir(workspace_id.as_str());
        let storage_path = self.paths.workspace_storage_dir(workspace_id.as_str());

        self.vcs
            .add_worktree(&worktree_path, &working_branch, base_branch.as_str())?;
        std::fs::create_dir_all(&storage_path)?;

        let now = Utc::now();
        let metadata = WorkspaceMetadata {
            id: workspace_id.clone(),
            index: index.to_string(),
            name: opts.name,
            description: opts.description,
            base_branch,
            working_branch,
            worktree_path,
            storage_path,
            auto_created: opts.auto_created,
            created_at: now,
            updated_at: now,
        };

        self.save_metadata(&metadata)?;
        info!(event = "core.workspace.create_completed", workspace_id = %workspace_id, index);

        Ok(Workspace::from_metadata(metadata, true, true))
    }

    pub fn get(&self, id: &WorkspaceId) -> Result<Workspace, WorkspaceError> {
        let metadata = self.load_metadata(id)?;
        let path_exists = metadata.worktree_path.parent().map(|p| p.is_dir()).unwrap_or(false);
        let worktree_exists = self
            .vcs
            .list_worktrees()?
            .iter()
            .any(|e| e.path == metadata.worktree_path);
        Ok(Workspace::from_metadata(metadata, path_exists, worktree_exists))
    }

    pub fn list(&self) -> Result<Vec<Workspace>, WorkspaceError> {
        let dir = self.paths.workspaces_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                ids.push(name.to_string());
            }
        }

        let cleaned = self.index.reconcile(&EntityKind::Workspace, &ids)?;
        if cleaned > 0 {
            warn!(event = "core.workspace.index_reconciled", cleaned);
        }

        let mut workspaces = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&WorkspaceId::new(id.clone())) {
                Ok(ws) => workspaces.push(ws),
                Err(e) => warn!(event = "core.workspace.list_entry_skipped", id, error = %e),
            }
        }
        Ok(workspaces)
    }

    /// Resolve an identifier that may be a workspace ID, a short index
    /// (from C1), or a name — in that order.
    pub fn resolve_workspace(&self, identifier: &str) -> Result<Workspace, WorkspaceError> {
        if let Ok(ws) = self.get(&WorkspaceId::new(identifier)) {
            return Ok(ws);
        }
        if let Ok(index) = identifier.parse::<u64>()
            && let Some(entity_id) = self.index.get_by_index(&EntityKind::Workspace, index)?
        {
            return self.get(&WorkspaceId::new(entity_id));
        }
        if let Some(ws) = self.find_by_name(identifier)? {
            return Ok(ws);
        }
        Err(WorkspaceError::NotFound { id: identifier.to_string() })
    }

    pub fn remove(
        &self,
        id: &WorkspaceId,
        opts: RemoveOptions,
        stopper: Option<&dyn SessionStopper>,
    ) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        let semaphore = self.semaphore_for(id);
        let holders = semaphore.holders()?;

        if !holders.is_empty() && !opts.force {
            return Err(WorkspaceError::InUse { id: id.as_str().to_string(), holders });
        }

        if let Some(current_dir) = &opts.current_dir
            && is_within(current_dir, workspace.worktree_path())
        {
            return Err(WorkspaceError::CurrentDirInsideWorktree);
        }

        if !holders.is_empty()
            && let Some(stopper) = stopper
        {
            stopper.stop_sessions_for_workspace(id, opts.force);
        }

        if let Err(e) = self.vcs.remove_worktree(workspace.worktree_path()) {
            warn!(event = "core.workspace.worktree_remove_failed", id = %id, error = %e);
        }

        let dir = self.paths.workspace_dir(id.as_str());
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }

        self.index.release(&EntityKind::Workspace, id.as_str())?;
        self.semaphores.lock().unwrap().remove(id.as_str());

        info!(event = "core.workspace.remove_completed", id = %id, no_hooks = opts.no_hooks);
        Ok(())
    }

    pub fn acquire_semaphore(&self, id: &WorkspaceId, holder: &str) -> Result<(), WorkspaceError> {
        self.semaphore_for(id).acquire(holder)?;
        Ok(())
    }

    pub fn release_semaphore(&self, id: &WorkspaceId, holder: &str) -> Result<(), WorkspaceError> {
        self.semaphore_for(id).release(holder)?;
        Ok(())
    }

    pub fn semaphore_holders(&self, id: &WorkspaceId) -> Result<Vec<String>, WorkspaceError> {
        Ok(self.semaphore_for(id).holders()?)
    }

    pub fn prune(&self, idle_days: i64, dry_run: bool) -> Result<Vec<WorkspaceId>, WorkspaceError> {
        let now = Utc::now();
        let mut pruned = Vec::new();
        for workspace in self.list()? {
            let idle_for = now.signed_duration_since(workspace.metadata.updated_at);
            if idle_for.num_days() < idle_days {
                continue;
            }
            pruned.push(workspace.metadata.id.clone());
            if !dry_run {
                self.remove(&workspace.metadata.id, RemoveOptions { force: true, ..Default::default() }, None)?;
            }
        }
        Ok(pruned)
    }

    fn semaphore_for(&self, id: &WorkspaceId) -> Arc<FileSemaphore> {
        let mut semaphores = self.semaphores.lock().unwrap();
        semaphores
            .entry(id.as_str().to_string())
            .or_insert_with(|| {
                Arc::new(FileSemaphore::new(
                    self.paths.workspace_semaphore_file(id.as_str()),
                    self.paths.workspace_semaphore_lock_file(id.as_str()),
                    self.default_semaphore_capacity,
                ))
            })
            .clone()
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Workspace>, WorkspaceError> {
        for workspace in self.list_raw()? {
            if workspace.metadata.name == name {
                return Ok(Some(workspace));
            }
        }
        Ok(None)
    }

    /// Like `list`, but skips index reconciliation — used internally by
    /// `find_by_name` so `Create`'s existence check doesn't trigger a
    /// reconciliation side effect on every call.
    fn list_raw(&self) -> Result<Vec<Workspace>, WorkspaceError> {
        let dir = self.paths.workspaces_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut workspaces = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
                && let Ok(ws) = self.get(&WorkspaceId::new(name))
            {
                workspaces.push(ws);
            }
        }
        Ok(workspaces)
    }

    fn load_metadata(&self, id: &WorkspaceId) -> Result<WorkspaceMetadata, WorkspaceError> {
        let path = self.paths.workspace_metadata_file(id.as_str());
        let content = std::fs::read_to_string(&path).map_err(|_| WorkspaceError::NotFound { id: id.as_str().to_string() })?;
        serde_yaml::from_str(&content).map_err(|e| WorkspaceError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save_metadata(&self, metadata: &WorkspaceMetadata) -> Result<(), WorkspaceError> {
        let path = self.paths.workspace_metadata_file(metadata.id.as_str());
        let yaml = serde_yaml::to_string(metadata).map_err(|e| WorkspaceError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&path, yaml.as_bytes())?;
        Ok(())
    }
}

fn is_within(candidate: &Path, base: &Path) -> bool {
    let candidate = candidate.canonicalize().unwrap_or_else(|_| candidate.to_path_buf());
    let base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    candidate.starts_with(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amux_protocol::vcs::{VcsError, WorktreeEntry};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct FakeVcs {
        worktrees: StdMutex<Vec<WorktreeEntry>>,
    }

    impl FakeVcs {
        fn new() -> Self {
            Self { worktrees: StdMutex::new(Vec::new()) }
        }
    }

    impl Vcs for FakeVcs {
        fn create_branch(&self, _branch: &BranchName, _base: &str) -> Result<(), VcsError> {
            Ok(())
        }

        fn add_worktree(&self, path: &Path, branch: &BranchName, _base: &str) -> Result<(), VcsError> {
            std::fs::create_dir_all(path).unwrap();
            self.worktrees.lock().unwrap().push(WorktreeEntry {
                path: path.to_path_buf(),
                branch: branch.clone(),
            });
            Ok(())
        }

        fn remove_worktree(&self, path: &Path) -> Result<(), VcsError> {
            self.worktrees.lock().unwrap().retain(|e| e.path != path);
            Ok(())
        }

        fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, VcsError> {
            Ok(self.worktrees.lock().unwrap().clone())
        }
    }

    fn manager(dir: &Path) -> WorkspaceManager {
        let amux_dir = dir.join(".amux");
        let paths = AmuxPaths::from_dir(amux_dir.clone());
        let index = Arc::new(IndexManager::new(paths.index_state_file(), paths.index_lock_file()));
        WorkspaceManager::new(paths, Arc::new(FakeVcs::new()), index)
    }

    #[test]
    fn create_assigns_smallest_index_and_persists_metadata() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());

        let ws = mgr
            .create(CreateOptions {
                name: "feat-auth".to_string(),
                base_branch: Some("main".to_string()),
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();

        assert_eq!(ws.metadata.index, "1");
        assert_eq!(ws.metadata.working_branch.as_str(), "amux/feat-auth");
        assert!(ws.path_exists);
        assert!(ws.worktree_exists);
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        let opts = || CreateOptions {
            name: "dup".to_string(),
            base_branch: None,
            branch: None,
            description: String::new(),
            auto_created: false,
        };
        mgr.create(opts()).unwrap();
        let err = mgr.create(opts()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists { .. }));
    }

    #[test]
    fn remove_then_recreate_reuses_index() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());

        let ws1 = mgr
            .create(CreateOptions {
                name: "feat-auth".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();
        assert_eq!(ws1.metadata.index, "1");

        mgr.remove(&ws1.metadata.id, RemoveOptions::default(), None).unwrap();

        let ws2 = mgr
            .create(CreateOptions {
                name: "feat-auth2".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();
        assert_eq!(ws2.metadata.index, "1");
    }

    #[test]
    fn remove_refuses_when_in_use_without_force() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        let ws = mgr
            .create(CreateOptions {
                name: "feat-holder".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();

        mgr.acquire_semaphore(&ws.metadata.id, "session-1").unwrap();

        let err = mgr.remove(&ws.metadata.id, RemoveOptions::default(), None).unwrap_err();
        assert!(matches!(err, WorkspaceError::InUse { .. }));

        mgr.remove(&ws.metadata.id, RemoveOptions { force: true, ..Default::default() }, None)
            .unwrap();
    }

    #[test]
    fn list_reconciles_stale_index_entries() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        let ws = mgr
            .create(CreateOptions {
                name: "feat-stale".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();

        // Simulate an externally-deleted workspace directory without going
        // through `remove`, leaving a stale index entry behind.
        std::fs::remove_dir_all(mgr.paths.workspace_dir(ws.metadata.id.as_str())).unwrap();

        let workspaces = mgr.list().unwrap();
        assert!(workspaces.is_empty());

        let ws2 = mgr
            .create(CreateOptions {
                name: "feat-new".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();
        assert_eq!(ws2.metadata.index, "1");
    }

    #[test]
    fn resolve_workspace_matches_id_then_index_then_name() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        let ws = mgr
            .create(CreateOptions {
                name: "feat-resolve".to_string(),
                base_branch: None,
                branch: None,
                description: String::new(),
                auto_created: false,
            })
            .unwrap();

        assert_eq!(mgr.resolve_workspace("feat-resolve").unwrap().metadata.id, ws.metadata.id);
        assert_eq!(mgr.resolve_workspace("1").unwrap().metadata.id, ws.metadata.id);
    }
}
