use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use amux_protocol::EntityKind;
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::lock::acquire_exclusive;

use super::errors::IndexError;
use super::types::IndexState;

/// Issues and recycles small positive integers per entity kind (C1).
///
/// Every mutating and reading operation takes both the process-local
/// `Mutex` (below) and an advisory OS file lock on a sibling `.lock` file,
/// reloading state inside the critical section so concurrent writes from
/// other processes are observed before this process acts.
pub struct IndexManager {
    state_path: PathBuf,
    lock_path: PathBuf,
    // Guards against races between threads of this same process; the file
    // lock alone would permit two threads to interleave read-modify-write
    // cycles between the lock's acquire and the first's release boundary.
    guard: Mutex<()>,
}

impl IndexManager {
    pub fn new(state_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            lock_path: lock_path.into(),
            guard: Mutex::new(()),
        }
    }

    /// If `entityID` already has an index for `kind`, returns it unchanged
    /// (idempotent). Otherwise assigns the smallest released index if any
    /// exist, else increments the high-water counter.
    pub fn acquire(&self, kind: &EntityKind, entity_id: &str) -> Result<u64, IndexError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| IndexError::LockError { message: e.to_string() })?;

        let mut state = self.load(&_file_lock)?;

        if let Some((&index, _)) = state
            .active
            .get(kind)
            .and_then(|m| m.iter().find(|(_, v)| v.as_str() == entity_id))
        {
            debug!(event = "core.index.acquire_idempotent", kind = %kind, entity_id = entity_id, index = index);
            return Ok(index);
        }

        let index = if let Some(released) = state.released.get_mut(kind) {
            if released.is_empty() {
                None
            } else {
                released.sort_unstable();
                Some(released.remove(0))
            }
        } else {
            None
        };

        let index = match index {
            Some(i) => i,
            None => {
                let counter = state.counters.entry(kind.clone()).or_insert(0);
                *counter += 1;
                *counter
            }
        };

        state
            .active
            .entry(kind.clone())
            .or_default()
            .insert(index, entity_id.to_string());

        self.save(&state)?;

        info!(event = "core.index.acquire_completed", kind = %kind, entity_id = entity_id, index = index);
        Ok(index)
    }

    /// Removes the `(index, entityID)` pair from `active` and appends the
    /// freed index to `released`. No-op if unknown.
    pub fn release(&self, kind: &EntityKind, entity_id: &str) -> Result<(), IndexError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| IndexError::LockError { message: e.to_string() })?;

        let mut state = self.load(&_file_lock)?;

        let freed = state.active.get_mut(kind).and_then(|active| {
            let found = active
                .iter()
                .find(|(_, v)| v.as_str() == entity_id)
                .map(|(&k, _)| k);
            found.map(|index| {
                active.remove(&index);
                index
            })
        });

        let Some(index) = freed else {
            debug!(event = "core.index.release_noop", kind = %kind, entity_id = entity_id);
            return Ok(());
        };

        state.released.entry(kind.clone()).or_default().push(index);
        self.save(&state)?;

        info!(event = "core.index.release_completed", kind = %kind, entity_id = entity_id, index = index);
        Ok(())
    }

    pub fn get(&self, kind: &EntityKind, entity_id: &str) -> Result<Option<u64>, IndexError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| IndexError::LockError { message: e.to_string() })?;
        let state = self.load(&_file_lock)?;
        Ok(state
            .active
            .get(kind)
            .and_then(|m| m.iter().find(|(_, v)| v.as_str() == entity_id))
            .map(|(&index, _)| index))
    }

    pub fn get_by_index(
        &self,
        kind: &EntityKind,
        index: u64,
    ) -> Result<Option<String>, IndexError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| IndexError::LockError { message: e.to_string() })?;
        let state = self.load(&_file_lock)?;
        Ok(state.active.get(kind).and_then(|m| m.get(&index)).cloned())
    }

    /// Releases every `active` pair for `kind` whose `entityID` is absent
    /// from `existing_ids`. Returns the number of entries cleaned up.
    pub fn reconcile(&self, kind: &EntityKind, existing_ids: &[String]) -> Result<usize, IndexError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| IndexError::LockError { message: e.to_string() })?;

        let mut state = self.load(&_file_lock)?;

        let stale: Vec<(u64, String)> = state
            .active
            .get(kind)
            .map(|m| {
                m.iter()
                    .filter(|(_, v)| !existing_ids.iter().any(|id| id == *v))
                    .map(|(&k, v)| (k, v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if stale.is_empty() {
            return Ok(0);
        }

        if let Some(active) = state.active.get_mut(kind) {
            let released = state.released.entry(kind.clone()).or_default();
            for (index, _) in &stale {
                active.remove(index);
                released.push(*index);
            }
        }

        self.save(&state)?;

        warn!(
            event = "core.index.reconcile_completed",
            kind = %kind,
            cleaned = stale.len(),
        );
        Ok(stale.len())
    }

    fn load(&self, _file_lock: &nix::fcntl::Flock<fs::File>) -> Result<IndexState, IndexError> {
        match fs::read_to_string(&self.state_path) {
            Ok(content) => serde_yaml::from_str(&content).map_err(|e| IndexError::ParseError {
                path: self.state_path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IndexState::default()),
            Err(e) => Err(IndexError::Io(e)),
        }
    }

    fn save(&self, state: &IndexState) -> Result<(), IndexError> {
        let yaml = serde_yaml::to_string(state).map_err(|e| IndexError::ParseError {
            path: self.state_path.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&self.state_path, yaml.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amux_protocol::EntityKind;
    use std::path::Path;

    fn manager(dir: &Path) -> IndexManager {
        IndexManager::new(
            dir.join("index/state.yaml"),
            dir.join("index/state.yaml.lock"),
        )
    }

    #[test]
    fn acquire_assigns_smallest_free_then_increments() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());

        assert_eq!(m.acquire(&EntityKind::Workspace, "ws1").unwrap(), 1);
        assert_eq!(m.acquire(&EntityKind::Workspace, "ws2").unwrap(), 2);
        m.release(&EntityKind::Workspace, "ws1").unwrap();
        assert_eq!(m.acquire(&EntityKind::Workspace, "ws3").unwrap(), 1);
        assert_eq!(m.acquire(&EntityKind::Workspace, "ws4").unwrap(), 3);
    }

    #[test]
    fn acquire_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let first = m.acquire(&EntityKind::Session, "s1").unwrap();
        let second = m.acquire(&EntityKind::Session, "s1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn release_unknown_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.release(&EntityKind::Session, "nonexistent").unwrap();
    }

    #[test]
    fn get_and_get_by_index_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let idx = m.acquire(&EntityKind::Workspace, "ws1").unwrap();
        assert_eq!(m.get(&EntityKind::Workspace, "ws1").unwrap(), Some(idx));
        assert_eq!(
            m.get_by_index(&EntityKind::Workspace, idx).unwrap(),
            Some("ws1".to_string())
        );
        assert_eq!(m.get(&EntityKind::Workspace, "missing").unwrap(), None);
    }

    #[test]
    fn reconcile_releases_orphaned_indices() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.acquire(&EntityKind::Workspace, "ws1").unwrap();
        m.acquire(&EntityKind::Workspace, "ws2").unwrap();

        let cleaned = m
            .reconcile(&EntityKind::Workspace, &["ws2".to_string()])
            .unwrap();
        assert_eq!(cleaned, 1);
        assert_eq!(m.get(&EntityKind::Workspace, "ws1").unwrap(), None);
        assert_eq!(m.get(&EntityKind::Workspace, "ws2").unwrap(), Some(2));

        // Already-clean reconcile reports zero.
        let cleaned_again = m
            .reconcile(&EntityKind::Workspace, &["ws2".to_string()])
            .unwrap();
        assert_eq!(cleaned_again, 0);
    }

    #[test]
    fn state_persists_across_manager_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let m = manager(dir.path());
            assert_eq!(m.acquire(&EntityKind::Workspace, "ws1").unwrap(), 1);
            assert_eq!(m.acquire(&EntityKind::Workspace, "ws2").unwrap(), 2);
            m.release(&EntityKind::Workspace, "ws1").unwrap();
        }
        let m2 = manager(dir.path());
        assert_eq!(m2.acquire(&EntityKind::Workspace, "ws3").unwrap(), 1);
        assert_eq!(
            m2.get(&EntityKind::Workspace, "ws2").unwrap(),
            Some(2)
        );
    }

    #[test]
    fn corrupt_state_file_is_fatal_to_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("index/state.yaml");
        fs::create_dir_all(state_path.parent().unwrap()).unwrap();
        fs::write(&state_path, "not: [valid, yaml: structure").unwrap();
        let m = IndexManager::new(state_path, dir.path().join("index/state.yaml.lock"));
        let result = m.acquire(&EntityKind::Workspace, "ws1");
        assert!(matches!(result, Err(IndexError::ParseError { .. })));
    }

    #[test]
    fn concurrent_acquire_across_threads_never_duplicates_indices() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let m = Arc::new(manager(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let m = Arc::clone(&m);
                thread::spawn(move || m.acquire(&EntityKind::Session, &format!("s{}", i)).unwrap())
            })
            .collect();

        let indices: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let unique: HashSet<u64> = indices.iter().copied().collect();
        assert_eq!(unique.len(), indices.len(), "no two entities share an index");
    }
}
