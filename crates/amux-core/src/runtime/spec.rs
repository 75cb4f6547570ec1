use std::collections::HashMap;
use std::path::PathBuf;

/// Input to a runtime's `Execute`. For `command.len() == 1` the single
/// element is interpreted as a shell string; otherwise as argv (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct ExecutionSpec {
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    pub session_id: String,
    pub enable_log: bool,
    pub options: HashMap<String, String>,
}

impl ExecutionSpec {
    pub fn new(session_id: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            command,
            session_id: session_id.into(),
            enable_log: true,
            ..Default::default()
        }
    }

    /// `command` resolved to an argv, expanding a single shell-string
    /// element via `$SHELL -c`.
    pub fn argv(&self, shell: &str) -> Vec<String> {
        if self.command.len() == 1 {
            vec![shell.to_string(), "-c".to_string(), self.command[0].clone()]
        } else {
            self.command.clone()
        }
    }
}
