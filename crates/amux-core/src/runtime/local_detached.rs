//! `local-detached` runtime: spawns the command wrapped in the I/O proxy
//! (`amux-proxy`, default Captured mode) in the background and returns
//! immediately. Output capture/streaming/activity all read the proxy's own
//! per-run `console.log` and `status.yaml` rather than talking to the child
//! directly — the same files the `tmux` runtime's capability impls read
//! (spec §4.4: "Same spawn mechanism [as `local`], minus blocking").

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use amux_paths::AmuxPaths;

use crate::runtime::errors::RuntimeError;
use crate::runtime::process::{
    ActivityMonitor, OutputCapture, OutputStreamer, Process, ProcessState, StreamOptions,
    MIN_AUTO_CAPTURE_LINES,
};
use crate::runtime::runtime_trait::Runtime;
use crate::runtime::spec::ExecutionSpec;

const DEFAULT_SHELL: &str = "/bin/sh";

pub struct LocalDetachedRuntime {
    paths: AmuxPaths,
    proxy_bin: String,
    processes: Mutex<HashMap<String, Arc<LocalDetachedProcess>>>,
}

impl LocalDetachedRuntime {
    pub fn new(paths: AmuxPaths) -> Self {
        let proxy_bin = std::env::var("AMUX_BIN").unwrap_or_else(|_| "amux-proxy".to_string());
        Self {
            paths,
            proxy_bin,
            processes: Mutex::new(HashMap::new()),
        }
    }
}

impl Runtime for LocalDetachedRuntime {
    fn kind(&self) -> &'static str {
        "local-detached"
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

        let status_path = self.paths.session_status_file(&spec.session_id);
        let run_id = amux_proxy::status::next_run_id(&status_path);
        let log_path = self.paths.session_run_log_file(&spec.session_id, run_id);

        let mut command = Command::new(&self.proxy_bin);
        command.arg(&spec.session_id);
        command.arg("--");
        command.args(&argv);
        command.process_group(0);
        command.stdin(Stdio::null());
        // the proxy owns its own stdout/stderr framing (log file + broadcast
        // ring); the grandparent doesn't need a copy of it.
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
        command.env("AMUX_DIR", self.paths.amux_dir());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &spec.environment {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(RuntimeError::Io)?;
        let pid = child.id();

        let process = Arc::new(LocalDetachedProcess {
            id: spec.session_id.clone(),
            pid,
            status_path,
            log_path,
            start_time: Utc::now(),
            last_activity_at: RwLock::new(None),
            exit_code: AtomicI32::new(i32::MIN),
            running: AtomicBool::new(true),
            metadata: HashMap::new(),
        });

        let watched = process.clone();
        std::thread::spawn(move || {
            let status = child.wait();
            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            watched.exit_code.store(code, Ordering::SeqCst);
            watched.running.store(false, Ordering::SeqCst);
        });

        self.processes
            .lock()
            .expect("registry lock poisoned")
            .insert(spec.session_id, process.clone());
        Ok(Box::new(LocalDetachedHandle(process)))
    }

    fn find(&self, id: &str) -> Result<Box<dyn Process>, RuntimeError> {
        self.processes
            .lock()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
            .map(|p| Box::new(LocalDetachedHandle(p)) as Box<dyn Process>)
            .ok_or_else(|| RuntimeError::ProcessNotFound { id: id.to_string() })
    }

    fn list(&self) -> Result<Vec<Box<dyn Process>>, RuntimeError> {
        Ok(self
            .processes
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .map(|p| Box::new(LocalDetachedHandle(p)) as Box<dyn Process>)
            .collect())
    }
}

struct LocalDetachedProcess {
    id: String,
    pid: u32,
    status_path: std::path::PathBuf,
    log_path: std::path::PathBuf,
    start_time: DateTime<Utc>,
    last_activity_at: RwLock<Option<DateTime<Utc>>>,
    exit_code: AtomicI32,
    running: AtomicBool,
    metadata: HashMap<String, String>,
}

/// Thin `Box<dyn Process>` wrapper around the shared, thread-watched handle.
struct LocalDetachedHandle(Arc<LocalDetachedProcess>);

impl LocalDetachedHandle {
    fn signal(&self, signal: Signal) -> Result<(), RuntimeError> {
        match killpg(Pid::from_raw(self.0.pid as i32), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(errno) => Err(RuntimeError::Io(std::io::Error::from_raw_os_error(errno as i32))),
        }
    }

    fn tail_log(&self, lines: usize) -> Result<Vec<u8>, RuntimeError> {
        let lines = lines.max(MIN_AUTO_CAPTURE_LINES);
        let contents = std::fs::read(&self.0.log_path).map_err(RuntimeError::Io)?;
        let mut newline_positions: Vec<usize> = contents
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .map(|(i, _)| i)
            .collect();
        if newline_positions.len() <= lines {
            return Ok(contents);
        }
        newline_positions.reverse();
        let cut = newline_positions[lines - 1];
        Ok(contents[cut + 1..].to_vec())
    }
}

impl Process for LocalDetachedHandle {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn state(&self) -> ProcessState {
        if self.0.running.load(Ordering::SeqCst) {
            ProcessState::Running
        } else {
            ProcessState::Exited
        }
    }

    fn wait(&self) -> Result<i32, RuntimeError> {
        while self.0.running.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        Ok(self.0.exit_code.load(Ordering::SeqCst))
    }

    fn stop(&self) -> Result<(), RuntimeError> {
        self.signal(Signal::SIGTERM)
    }

    fn kill(&self) -> Result<(), RuntimeError> {
        self.signal(Signal::SIGKILL)
    }

    fn exit_code(&self) -> Result<i32, RuntimeError> {
        if self.0.running.load(Ordering::SeqCst) {
            return Err(RuntimeError::StillRunning);
        }
        Ok(self.0.exit_code.load(Ordering::SeqCst))
    }

    fn start_time(&self) -> DateTime<Utc> {
        self.0.start_time
    }

    fn metadata(&self) -> &HashMap<String, String> {
        &self.0.metadata
    }

    fn as_output_capture(&self) -> Option<&dyn OutputCapture> {
        Some(self)
    }

    fn as_output_streamer(&self) -> Option<&dyn OutputStreamer> {
        Some(self)
    }

    fn as_activity_monitor(&self) -> Option<&dyn ActivityMonitor> {
        Some(self)
    }
}

impl OutputCapture for LocalDetachedHandle {
    fn capture_output(&self, lines: usize) -> Result<Vec<u8>, RuntimeError> {
        self.tail_log(lines)
    }
}

impl OutputStreamer for LocalDetachedHandle {
    fn stream_output(
        &self,
        writer: &mut dyn std::io::Write,
        options: StreamOptions,
        cancel: &std::sync::atomic::AtomicBool,
    ) -> Result<(), RuntimeError> {
        let mut file = loop {
            match std::fs::File::open(&self.0.log_path) {
                Ok(file) => break file,
                Err(_) if cancel.load(Ordering::SeqCst) => return Ok(()),
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(50)),
            }
        };
        let mut position = 0u64;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            file.seek(SeekFrom::Start(position)).map_err(RuntimeError::Io)?;
            let mut chunk = Vec::new();
            file.read_to_end(&mut chunk).map_err(RuntimeError::Io)?;
            if !chunk.is_empty() {
                position += chunk.len() as u64;
                writer.write_all(&chunk).map_err(RuntimeError::Io)?;
                *self.0.last_activity_at.write().expect("lock poisoned") = Some(Utc::now());
            }
            if !self.0.running.load(Ordering::SeqCst) {
                return Ok(());
            }
            std::thread::sleep(options.poll_interval);
        }
    }
}

impl ActivityMonitor for LocalDetachedHandle {
    fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        amux_proxy::status::read_status(&self.0.status_path)
            .and_then(|s| s.last_activity_at)
            .or_else(|| *self.0.last_activity_at.read().expect("lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::process::ProcessState;

    fn runtime(dir: &std::path::Path) -> LocalDetachedRuntime {
        LocalDetachedRuntime::new(AmuxPaths::from_dir(dir.join(".amux")))
    }

    #[test]
    fn execute_rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(dir.path());
        let spec = ExecutionSpec::new("sess-a", vec![]);
        let err = rt.execute(spec).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidCommand { .. }));
    }

    #[test]
    fn execute_propagates_io_error_when_proxy_binary_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut rt = runtime(dir.path());
        rt.proxy_bin = "/nonexistent/amux-proxy-binary-that-does-not-exist".to_string();
        let spec = ExecutionSpec::new("sess-b", vec!["exit 0".to_string()]);
        let err = rt.execute(spec).unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }

    #[test]
    fn find_errors_for_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let rt = runtime(dir.path());
        let err = rt.find("missing").unwrap_err();
        assert!(matches!(err, RuntimeError::ProcessNotFound { .. }));
    }

    #[test]
    fn tail_log_reads_back_written_content() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("console.log");
        std::fs::write(&log_path, "line one\nline two\n").unwrap();
        let handle = LocalDetachedHandle(Arc::new(LocalDetachedProcess {
            id: "sess-c".to_string(),
            pid: i32::MAX as u32 - 1,
            status_path: dir.path().join("status.yaml"),
            log_path,
            start_time: Utc::now(),
            last_activity_at: RwLock::new(None),
            exit_code: AtomicI32::new(0),
            running: AtomicBool::new(false),
            metadata: HashMap::new(),
        }));
        let output = handle.tail_log(0).unwrap();
        assert!(String::from_utf8_lossy(&output).contains("line two"));
        assert_eq!(handle.state(), ProcessState::Exited);
    }
}
