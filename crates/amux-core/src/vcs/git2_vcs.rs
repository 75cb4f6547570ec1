//! `git2`-backed implementation of the `Vcs` trait (spec §4.6, §9).

use std::path::Path;
use std::time::Duration;

use amux_protocol::types::BranchName;
use amux_protocol::vcs::{Vcs, VcsError, WorktreeEntry};
use git2::{BranchType, Repository, WorktreeAddOptions};
use tracing::{debug, warn};

use super::naming::sanitize_for_path;

const WORKTREE_ADD_MAX_RETRIES: u32 = 3;
const WORKTREE_ADD_RETRY_DELAY: Duration = Duration::from_millis(50);

fn git2_err(e: git2::Error) -> VcsError {
    VcsError::OperationFailed { message: e.to_string() }
}

/// Opens the repository at `repo_path` for every call. `git2::Repository`
/// is cheap to reopen and not `Send`, so a new handle per operation avoids
/// holding one across an `await`/thread boundary.
pub struct Git2Vcs {
    repo_path: std::path::PathBuf,
}

impl Git2Vcs {
    pub fn new(repo_path: impl Into<std::path::PathBuf>) -> Self {
        Self { repo_path: repo_path.into() }
    }

    fn open(&self) -> Result<Repository, VcsError> {
        Repository::open(&self.repo_path).map_err(git2_err)
    }
}

impl Vcs for Git2Vcs {
    fn create_branch(&self, branch: &BranchName, base: &str) -> Result<(), VcsError> {
        let repo = self.open()?;

        if repo.find_branch(branch.as_str(), BranchType::Local).is_ok() {
            return Err(VcsError::BranchAlreadyExists {
                branch: branch.as_str().to_string(),
            });
        }

        let base_commit = resolve_base(&repo, base)?;
        repo.branch(branch.as_str(), &base_commit, false).map_err(git2_err)?;
        debug!(event = "core.vcs.branch.create_completed", branch = branch.as_str());
        Ok(())
    }

    fn add_worktree(&self, path: &Path, branch: &BranchName, base: &str) -> Result<(), VcsError> {
        let repo = self.open()?;

        if path.exists() {
            return Err(VcsError::WorktreeAlreadyExists {
                path: path.display().to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if repo.find_branch(branch.as_str(), BranchType::Local).is_err() {
            let base_commit = resolve_base(&repo, base)?;
            repo.branch(branch.as_str(), &base_commit, false).map_err(git2_err)?;
        }

        let branch_ref = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(git2_err)?
            .into_reference();

        let admin_name = format!("amux-{}", sanitize_for_path(branch.as_str()));
        let mut opts = WorktreeAddOptions::new();
        opts.reference(Some(&branch_ref));

        add_worktree_with_retry(&repo, &admin_name, path, &opts)
    }

    fn remove_worktree(&self, path: &Path) -> Result<(), VcsError> {
        let repo = self.open()?;

        if let Some(worktree) = find_worktree_by_path(&repo, path) {
            if let Err(e) = worktree.prune(None) {
                warn!(event = "core.vcs.worktree.prune_failed", error = %e);
            }
        }

        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }

        Ok(())
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, VcsError> {
        let repo = self.open()?;
        let names = repo.worktrees().map_err(git2_err)?;

        let mut entries = Vec::new();
        for name in names.iter().flatten() {
            let Ok(worktree) = repo.find_worktree(name) else {
                continue;
            };
            let wt_path = worktree.path().to_path_buf();
            let branch = Repository::open(&wt_path)
                .ok()
                .and_then(|r| r.head().ok())
                .and_then(|head| head.shorthand().map(|s| s.to_string()))
                .unwrap_or_default();
            entries.push(WorktreeEntry {
                path: wt_path,
                branch: BranchName::from(branch.as_str()),
            });
        }
        Ok(entries)
    }
}

fn resolve_base<'repo>(repo: &'repo Repository, base: &str) -> Result<git2::Commit<'repo>, VcsError> {
    if let Ok(reference) = repo.resolve_reference_from_short_name(base) {
        return reference.peel_to_commit().map_err(git2_err);
    }
    repo.head()
        .and_then(|h| h.peel_to_commit())
        .map_err(git2_err)
}

/// Retries `repo.worktree()` on `git2::ErrorCode::Exists` from the
/// non-atomic `.git/worktrees/` mkdir race between two concurrent
/// `amux workspace create` invocations.
fn add_worktree_with_retry(
    repo: &Repository,
    name: &str,
    path: &Path,
    opts: &WorktreeAddOptions<'_>,
) -> Result<(), VcsError> {
    let mut attempt = 0;
    loop {
        match repo.worktree(name, path, Some(opts)) {
            Ok(_) => return Ok(()),
            Err(e) if e.code() == git2::ErrorCode::Exists && attempt < WORKTREE_ADD_MAX_RETRIES => {
                let admin_exists = repo.path().join("worktrees").join(name).exists();
                if admin_exists {
                    return Err(git2_err(e));
                }
                attempt += 1;
                warn!(event = "core.vcs.worktree.create_retry", attempt, error = %e);
                std::thread::sleep(WORKTREE_ADD_RETRY_DELAY);
            }
            Err(e) => return Err(git2_err(e)),
        }
    }
}

fn find_worktree_by_path(repo: &Repository, path: &Path) -> Option<git2::Worktree> {
    let names = repo.worktrees().ok()?;
    for name in names.iter().flatten() {
        if let Ok(worktree) = repo.find_worktree(name)
            && worktree.path() == path
        {
            return Some(worktree);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init_repo(path: &Path) {
        let repo = Repository::init(path).unwrap();
        let sig = git2::Signature::now("Test", "test@test.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();
    }

    #[test]
    fn add_worktree_creates_branch_and_checks_it_out() {
        let repo_dir = tempdir().unwrap();
        init_repo(repo_dir.path());
        let vcs = Git2Vcs::new(repo_dir.path());

        let wt_dir = tempdir().unwrap();
        let wt_path = wt_dir.path().join("worktree");
        let branch = BranchName::from("amux/feat-x");

        vcs.add_worktree(&wt_path, &branch, "main").unwrap();

        let wt_repo = Repository::open(&wt_path).unwrap();
        assert_eq!(wt_repo.head().unwrap().shorthand().unwrap(), "amux/feat-x");
    }

    #[test]
    fn add_worktree_rejects_existing_path() {
        let repo_dir = tempdir().unwrap();
        init_repo(repo_dir.path());
        let vcs = Git2Vcs::new(repo_dir.path());

        let wt_dir = tempdir().unwrap();
        let branch = BranchName::from("amux/feat-y");
        let err = vcs.add_worktree(wt_dir.path(), &branch, "main").unwrap_err();
        assert!(matches!(err, VcsError::WorktreeAlreadyExists { .. }));
    }

    #[test]
    fn remove_worktree_tolerates_already_gone() {
        let repo_dir = tempdir().unwrap();
        init_repo(repo_dir.path());
        let vcs = Git2Vcs::new(repo_dir.path());
        let result = vcs.remove_worktree(Path::new("/tmp/amux-test-nonexistent-path-xyz"));
        assert!(result.is_ok());
    }

    #[test]
    fn list_worktrees_reports_created_entries() {
        let repo_dir = tempdir().unwrap();
        init_repo(repo_dir.path());
        let vcs = Git2Vcs::new(repo_dir.path());

        let wt_dir = tempdir().unwrap();
        let wt_path = wt_dir.path().join("worktree");
        let branch = BranchName::from("amux/feat-z");
        vcs.add_worktree(&wt_path, &branch, "main").unwrap();

        let entries = vcs.list_worktrees().unwrap();
        assert!(entries.iter().any(|e| e.path == wt_path));
    }

    #[test]
    fn create_branch_rejects_duplicate() {
        let repo_dir = tempdir().unwrap();
        init_repo(repo_dir.path());
        let vcs = Git2Vcs::new(repo_dir.path());
        let branch = BranchName::from("amux/dup");
        vcs.create_branch(&branch, "main").unwrap();
        let err = vcs.create_branch(&branch, "main").unwrap_err();
        assert!(matches!(err, VcsError::BranchAlreadyExists { .. }));
    }
}
