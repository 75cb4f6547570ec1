use std::collections::HashMap;
use std::path::PathBuf;

/// Command and defaults resolved from a named task. The task manager itself
/// is an external collaborator (spec §1, "explicitly out of scope"); this
/// is the seam the session manager calls through, mirroring the
/// `SessionStopper` dependency-injection pattern used between C5 and C6.
pub struct TaskDefinition {
    pub command: Vec<String>,
    pub environment: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

pub trait TaskResolver: Send + Sync {
    fn resolve(&self, task_name: &str) -> Result<TaskDefinition, String>;
}
