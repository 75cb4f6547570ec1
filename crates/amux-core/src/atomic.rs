//! Write-temp-then-rename atomic file update, used by every on-disk mutation
//! in the core (index state, semaphore state, workspace/session metadata).

use std::fs;
use std::io;
use std::path::Path;

/// Write `contents` to `path` atomically: write to `<path>.tmp`, then rename
/// over `path`. The temp file is removed on any failure before the rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    let write_result = fs::write(&tmp_path, contents);
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
