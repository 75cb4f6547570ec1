//! `local` runtime: runs the command in the foreground, wrapped in the I/O
//! proxy (`amux-proxy --foreground`) in its own process group, and blocks
//! the caller until the proxy exits. `Stop`/`Kill` signal the whole group so
//! a shell-wrapped pipeline dies together (spec §4.4).

use std::collections::HashMap;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use amux_paths::AmuxPaths;

use crate::runtime::errors::RuntimeError;
use crate::runtime::process::{Process, ProcessState};
use crate::runtime::runtime_trait::Runtime;
use crate::runtime::spec::ExecutionSpec;

const DEFAULT_SHELL: &str = "/bin/sh";

pub struct LocalRuntime {
    paths: AmuxPaths,
    proxy_bin: String,
}

impl LocalRuntime {
    pub fn new(paths: AmuxPaths) -> Self {
        let proxy_bin = std::env::var("AMUX_BIN").unwrap_or_else(|_| "amux-proxy".to_string());
        Self { paths, proxy_bin }
    }

    /// Construct with an explicit proxy binary path, bypassing `$AMUX_BIN`
    /// resolution. Used by other modules' tests to point at a lightweight
    /// stand-in instead of the real `amux-proxy` binary.
    pub(crate) fn with_proxy_bin(paths: AmuxPaths, proxy_bin: String) -> Self {
        Self { paths, proxy_bin }
    }
}

/// Builds the argv the proxy binary is invoked with: `<proxy_bin> <session_id>
/// [--foreground] -- <command...>`. Split out from `execute` so the
/// construction itself can be tested without spawning anything.
fn build_proxy_argv(proxy_bin: &str, session_id: &str, foreground: bool, command: &[String]) -> Vec<String> {
    let mut args = vec![proxy_bin.to_string(), session_id.to_string()];
    if foreground {
        args.push("--foreground".to_string());
    }
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}

impl Runtime for LocalRuntime {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn execute(&self, spec: ExecutionSpec) -> Result<Box<dyn Process>, RuntimeError> {
        let argv = spec.argv(DEFAULT_SHELL);
        if argv.is_empty() {
            return Err(RuntimeError::InvalidCommand {
                message: "empty command".to_string(),
            });
        }

        let proxy_argv = build_proxy_argv(&self.proxy_bin, &spec.session_id, true, &argv);
        let (program, args) = proxy_argv.split_first().expect("proxy_argv always has a program");

        let mut command = Command::new(program);
        command.args(args);
        command.process_group(0);
        command.env("AMUX_DIR", self.paths.amux_dir());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.environment {
            command.env(key, value);
        }
        if !spec.enable_log {
            command.stdout(Stdio::null());
            command.stderr(Stdio::null());
        }

        let start_time = Utc::now();
        let mut child = command.spawn().map_err(RuntimeError::Io)?;
        let pid = child.id();
        // spec §4.4/§5: local.Execute is synchronous — it only returns
        // after the proxy (and the child it wraps) exits, handle already
        // carrying its final state.
        let status = child.wait().map_err(RuntimeError::Io)?;
        Ok(Box::new(LocalProcess {
            id: spec.session_id,
            pid,
            exit_code: status.code().unwrap_or(-1),
            start_time,
            metadata: HashMap::new(),
        }))
    }

    fn find(&self, id: &str) -> Result<Box<dyn Process>, RuntimeError> {
        Err(RuntimeError::ProcessNotFound { id: id.to_string() })
    }

    fn list(&self) -> Result<Vec<Box<dyn Process>>, RuntimeError> {
        Ok(Vec::new())
    }
}

/// A finished local process: by the time `execute` returns one, the proxy
/// (and the child it wraps) has already exited (see `LocalRuntime::execute`).
/// The pid is kept only so `stop`/`kill` can still reach lingering
/// descendants left behind in the same process group (e.g. a backgrounded
/// `&` job inside a shell-wrapped command).
pub struct LocalProcess {
    id: String,
    pid: u32,
    exit_code: i32,
    start_time: DateTime<Utc>,
    metadata: HashMap<String, String>,
}

impl LocalProcess {
    fn signal_group(&self, signal: Signal) -> Result<(), RuntimeError> {
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(errno) => Err(RuntimeError::Io(std::io::Error::from_raw_os_error(errno as i32))),
        }
    }
}

impl Process for LocalProcess {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> ProcessState {
        ProcessState::Exited
    }

    fn wait(&self) -> Result<i32, RuntimeError> {
        Ok(self.exit_code)
    }

    fn stop(&self) -> Result<(), RuntimeError> {
        self.signal_group(Signal::SIGTERM)
    }

    fn kill(&self) -> Result<(), RuntimeError> {
        self.signal_group(Signal::SIGKILL)
    }

    fn exit_code(&self) -> Result<i32, RuntimeError> {
        Ok(self.exit_code)
    }

    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(dir: &std::path::Path) -> LocalRuntime {
        LocalRuntime::new(AmuxPaths::from_dir(dir.join(".amux")))
    }

    #[test]
    fn build_proxy_argv_inserts_foreground_flag_and_separator() {
        let argv = build_proxy_argv("amux-proxy", "sess-1", true, &["echo".to_string(), "hi".to_string()]);
        assert_eq!(
            argv,
            vec![
                "amux-proxy".to_string(),
                "sess-1".to_string(),
                "--foreground".to_string(),
                "--".to_string(),
                "echo".to_string(),
                "hi".to_string(),
            ]
        );
    }

    #[test]
    fn build_proxy_argv_omits_foreground_flag_when_not_requested() {
        let argv = build_proxy_argv("amux-proxy", "sess-1", false, &["echo".to_string()]);
        assert_eq!(
            argv,
            vec![
                "amux-proxy".to_string(),
                "sess-1".to_string(),
                "--".to_string(),
                "echo".to_string(),
            ]
        );
    }

    #[test]
    fn execute_rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(dir.path());
        let spec = ExecutionSpec::new("sess-2", vec![]);
        let err = rt.execute(spec).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidCommand { .. }));
    }

    #[test]
    fn execute_propagates_io_error_when_proxy_binary_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut rt = runtime(dir.path());
        rt.proxy_bin = "/nonexistent/amux-proxy-binary-that-does-not-exist".to_string();
        let spec = ExecutionSpec::new("sess-3", vec!["exit 0".to_string()]);
        let err = rt.execute(spec).unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }

    #[test]
    fn stop_after_exit_is_a_no_op() {
        let process = LocalProcess {
            id: "sess-4".to_string(),
            pid: i32::MAX as u32 - 1,
            exit_code: 0,
            start_time: Utc::now(),
            metadata: HashMap::new(),
        };
        process.stop().unwrap();
        process.kill().unwrap();
        assert_eq!(process.state(), ProcessState::Exited);
    }
}
