//! Branch/worktree-admin-name helpers for the git2-backed `Vcs` (spec's
//! Supplemental features: branch-name sanitization for worktree admin names).

/// Replace `/` with `-` for use as a `.git/worktrees/<name>` admin entry.
/// git2's `repo.worktree()` treats the name as a flat directory component;
/// a branch like `feature/auth` would otherwise create nested directories.
pub fn sanitize_for_path(s: &str) -> String {
    s.replace('/', "-")
}

/// The worktree admin name for a workspace's branch, decoupled from the
/// branch ref itself via `WorktreeAddOptions::reference()` so the branch
/// keeps its slashes.
pub fn worktree_admin_name(workspace_id: &str, branch: &str) -> String {
    format!("amux-{}-{}", workspace_id, sanitize_for_path(branch))
}
