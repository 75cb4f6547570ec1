//! OS-level advisory file locking shared by the index allocator (C1) and the
//! per-workspace semaphore (C2). Both need cross-process serialization of
//! read-modify-write cycles against a JSON/YAML state file.

use std::fs;
use std::io;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};

/// Acquire an exclusive advisory lock on `lock_path`, creating the lock file
/// (and its parent directory) if necessary. The lock is released when the
/// returned guard is dropped.
pub fn acquire_exclusive(lock_path: &Path) -> io::Result<Flock<fs::File>> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path)?;
    Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, e)| io::Error::from_raw_os_error(e as i32))
}
