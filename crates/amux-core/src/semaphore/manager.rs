use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::lock::acquire_exclusive;

use super::errors::SemaphoreError;
use super::types::{clamp_capacity, Holder, SemaphoreState};

/// A counting semaphore whose state lives in a single JSON file guarded by
/// an OS file lock (C2). Coordinates exclusive or bounded access to a
/// workspace across sessions and processes.
///
/// Capacity is authoritative from the in-memory value passed at
/// construction: the persisted capacity is overwritten on every load and
/// resaved, so a capacity change between instantiations takes effect on the
/// next save (spec §4.2).
pub struct FileSemaphore {
    state_path: PathBuf,
    lock_path: PathBuf,
    capacity: u32,
    guard: Mutex<()>,
}

impl FileSemaphore {
    pub fn new(state_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>, capacity: u32) -> Self {
        Self {
            state_path: state_path.into(),
            lock_path: lock_path.into(),
            capacity: clamp_capacity(capacity),
            guard: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn acquire(&self, holder_id: &str) -> Result<(), SemaphoreError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| SemaphoreError::LockError { message: e.to_string() })?;

        let mut state = self.load()?;
        state.capacity = self.capacity;

        if state.holders.iter().any(|h| h.id == holder_id) {
            return Err(SemaphoreError::AlreadyHeld {
                id: holder_id.to_string(),
            });
        }
        if state.holders.len() as u32 >= state.capacity {
            return Err(SemaphoreError::NoCapacity);
        }

        state.holders.push(Holder {
            id: holder_id.to_string(),
            acquired_at: Utc::now(),
        });
        self.save(&state)?;

        info!(event = "core.semaphore.acquire_completed", holder = holder_id, count = state.holders.len());
        Ok(())
    }

    pub fn release(&self, holder_id: &str) -> Result<(), SemaphoreError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| SemaphoreError::LockError { message: e.to_string() })?;

        let mut state = self.load()?;
        state.capacity = self.capacity;

        let before = state.holders.len();
        state.holders.retain(|h| h.id != holder_id);
        if state.holders.len() == before {
            return Err(SemaphoreError::NotHeld {
                id: holder_id.to_string(),
            });
        }

        self.save(&state)?;
        info!(event = "core.semaphore.release_completed", holder = holder_id, count = state.holders.len());
        Ok(())
    }

    /// Idempotent bulk removal, used for crash cleanup.
    pub fn remove(&self, holder_ids: &[&str]) -> Result<(), SemaphoreError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| SemaphoreError::LockError { message: e.to_string() })?;

        let mut state = self.load()?;
        state.capacity = self.capacity;

        let before = state.holders.len();
        state.holders.retain(|h| !holder_ids.contains(&h.id.as_str()));
        if state.holders.len() != before {
            self.save(&state)?;
            debug!(event = "core.semaphore.remove_completed", removed = before - state.holders.len());
        }
        Ok(())
    }

    pub fn holders(&self) -> Result<Vec<String>, SemaphoreError> {
        let _thread_guard = self.guard.lock().unwrap();
        let _file_lock = acquire_exclusive(&self.lock_path)
            .map_err(|e| SemaphoreError::LockError { message: e.to_string() })?;
        let state = self.load()?;
        Ok(state.holders.into_iter().map(|h| h.id).collect())
    }

    pub fn count(&self) -> Result<usize, SemaphoreError> {
        Ok(self.holders()?.len())
    }

    pub fn available(&self) -> Result<usize, SemaphoreError> {
        let count = self.count()?;
        Ok((self.capacity as usize).saturating_sub(count))
    }

    /// Drops any file-lock handle held by this instance.
    ///
    /// Every operation above acquires and releases its own per-call lock, so
    /// there is no persistent handle to drop; this exists for API symmetry
    /// with the teacher's `Close()` and to give callers an explicit point to
    /// signal "I am done with this semaphore instance".
    pub fn close(&self) {
        warn!(event = "core.semaphore.closed");
    }

    fn load(&self) -> Result<SemaphoreState, SemaphoreError> {
        match fs::read_to_string(&self.state_path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| SemaphoreError::ParseError {
                path: self.state_path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(SemaphoreState::new(self.capacity))
            }
            Err(e) => Err(SemaphoreError::Io(e)),
        }
    }

    fn save(&self, state: &SemaphoreState) -> Result<(), SemaphoreError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| SemaphoreError::ParseError {
            path: self.state_path.display().to_string(),
            message: e.to_string(),
        })?;
        write_atomic(&self.state_path, json.as_bytes())?;
        Ok(())
    }
}
