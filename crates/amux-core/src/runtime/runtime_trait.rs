use crate::runtime::errors::RuntimeError;
use crate::runtime::process::Process;
use crate::runtime::spec::ExecutionSpec;

/// Abstracts "where and how" a command executes (spec §4.4).
pub trait Runtime: Send + Sync {
    /// Stable identifier (`local`, `local-detached`, `tmux`, ...).
    fn kind(&self) -> &'static str;

    /// One-shot capability check (binary present, version acceptable).
    fn validate(&self) -> Result<(), RuntimeError>;

    fn execute(&self, spec: ExecutionSpec) -> Result<Box<dyn Process>, RuntimeError>;

    fn find(&self, id: &str) -> Result<Box<dyn Process>, RuntimeError>;

    fn list(&self) -> Result<Vec<Box<dyn Process>>, RuntimeError>;
}
