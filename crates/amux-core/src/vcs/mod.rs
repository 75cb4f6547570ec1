pub mod git2_vcs;
pub mod naming;

pub use git2_vcs::Git2Vcs;
