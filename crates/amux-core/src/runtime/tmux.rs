//! `tmux` runtime: spawns the I/O proxy inside a detached tmux session and
//! supervises it via `tmux` subcommands rather than OS process handles
//! (spec §4.4). The lifecycle monitor here only tells `running` from
//! `stopped`; the richer `working`/`completed` distinction is the session
//! supervisor's job (C6), which reads this process through the capability
//! traits below.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use amux_paths::AmuxPaths;

use crate::runtime::errors::RuntimeError;
use crate::runtime::process::{
    ActivityMonitor, AttachableProcess, InputSender, OutputCapture, OutputStreamer, Process,
    ProcessState, StreamOptions, Supervised, SupervisionOutcome,
};
use crate::runtime::runtime_trait::Runtime;
use crate::runtime::spec::ExecutionSpec;

const DEFAULT_SHELL: &str = "/bin/sh";
const STOP_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

pub struct TmuxRuntime {
    paths: AmuxPaths,
    proxy_bin: String,
}

impl TmuxRuntime {
    pub fn new(paths: AmuxPaths) -> Self {
        let proxy_bin = std::env::var("AMUX_BIN").unwrap_or_else(|_| "amux-proxy".to_string());
        Self { paths, proxy_bin }
    }

    fn session_name(session_id: &str) -> String {
        format!("amux-{session_id}")
    }
}

fn run_tmux(args: &[&str]) -> Result<Output, RuntimeError> {
    Command::new("tmux")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(RuntimeError::Io)
}

fn session_exists(name: &str) -> bool {
    run_tmux(&["has-session", "-t", name])
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn sole_pane_dead(name: &str) -> bool {
    match run_tmux(&["list-panes", "-t", name, "-F", "#{pane_dead}"]) {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            let panes: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
            !panes.is_empty() && panes.iter().all(|p| p.trim() == "1")
        }
        _ => false,
    }
}

/// The pid of the pane's leader process, used by `Supervised::supervise` to
/// detect a finished child tmux itself hasn't reported yet (e.g. the shell
/// lingers after the foreground job under it has already exited).
fn pane_pid(name: &str) -> Option<u32> {
    let output = run_tmux(&["list-panes", "-t", name, "-F", "#{pane_pid}"]).ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}

impl Runtime for TmuxRuntime {
    fn kind(&self) -> &'static str {
        "tmux"
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        let output = Command::new("tmux")
            .arg("-V")
            .output()
            .map_err(RuntimeError::Io)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RuntimeError::NotAvailable {
                name: "tmux".to_string(),
                message: "tmux -V failed".to_string(),
            })
        }
    }

    fn execute(&self, spec: ExecutionSpec) -> Result<Box<dyn Process>, RuntimeError> {
        if spec.command.is_empty() {
            return Err(RuntimeError::InvalidCommand {
                message: "empty command".to_string(),
            });
        }
        let name = Self::session_name(&spec.session_id);
        if session_exists(&name) {
            return Err(RuntimeError::AlreadyRegistered { name });
        }

        let mut args: Vec<String> = vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            name.clone(),
            "-n".to_string(),
            "main".to_string(),
        ];
        if let Some(dir) = &spec.working_dir {
            args.push("-c".to_string());
            args.push(dir.to_string_lossy().to_string());
        }
        for (key, value) in &spec.environment {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(self.proxy_bin.clone());
        args.push(spec.session_id.clone());
        args.push("--".to_string());
        args.extend(spec.argv(DEFAULT_SHELL));

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_tmux(&arg_refs)?;
        if !output.status.success() {
            return Err(RuntimeError::NotAvailable {
                name: "tmux".to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        if spec.options.get("remain-on-exit").map(String::as_str) == Some("true") {
            let _ = run_tmux(&["set-option", "-t", &name, "remain-on-exit", "on"]);
        }

        let process = Arc::new(TmuxProcessShared {
            name: name.clone(),
            status_path: self.paths.session_status_file(&spec.session_id),
            start_time: Utc::now(),
            running: AtomicBool::new(true),
            exit_code: AtomicI32::new(0),
            metadata: HashMap::new(),
            last_hash: RwLock::new(None),
            supervision_hash: RwLock::new(None),
        });

        let monitored = process.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(std::time::Duration::from_millis(500));
            if !session_exists(&monitored.name) {
                monitored.running.store(false, Ordering::SeqCst);
                monitored.exit_code.store(1, Ordering::SeqCst);
                return;
            }
            if sole_pane_dead(&monitored.name) {
                monitored.running.store(false, Ordering::SeqCst);
                monitored.exit_code.store(0, Ordering::SeqCst);
                return;
            }
        });

        Ok(Box::new(TmuxProcess(process)))
    }

    fn find(&self, id: &str) -> Result<Box<dyn Process>, RuntimeError> {
        let name = Self::session_name(id);
        if !session_exists(&name) {
            return Err(RuntimeError::ProcessNotFound { id: id.to_string() });
        }
        let process = Arc::new(TmuxProcessShared {
            name,
            status_path: self.paths.session_status_file(id),
            start_time: Utc::now(),
            running: AtomicBool::new(true),
            exit_code: AtomicI32::new(0),
            metadata: HashMap::new(),
            last_hash: RwLock::new(None),
            supervision_hash: RwLock::new(None),
        });
        Ok(Box::new(TmuxProcess(process)))
    }

    fn list(&self) -> Result<Vec<Box<dyn Process>>, RuntimeError> {
        let output = run_tmux(&["list-sessions", "-F", "#{session_name}"])?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut processes: Vec<Box<dyn Process>> = Vec::new();
        for name in text.lines().filter(|l| l.starts_with("amux-")) {
            let id = name.trim_start_matches("amux-").to_string();
            if let Ok(process) = self.find(&id) {
                processes.push(process);
            }
        }
        Ok(processes)
    }
}

struct TmuxProcessShared {
    name: String,
    status_path: std::path::PathBuf,
    start_time: DateTime<Utc>,
    running: AtomicBool,
    exit_code: AtomicI32,
    metadata: HashMap<String, String>,
    last_hash: RwLock<Option<u64>>,
    /// Kept separate from `last_hash` above: that one drives the live
    /// `OutputStreamer` poll cadence for CLI viewing, this one drives the
    /// session supervisor's own, independent polling cadence. Sharing one
    /// hash would make the two cadences interfere with each other's
    /// change-detection.
    supervision_hash: RwLock<Option<u64>>,
}

struct TmuxProcess(Arc<TmuxProcessShared>);

impl TmuxProcess {
    fn capture(&self, lines: Option<u32>) -> Result<Vec<u8>, RuntimeError> {
        let n = lines.unwrap_or(200).to_string();
        let start = format!("-{n}");
        let output = run_tmux(&["capture-pane", "-p", "-e", "-S", &start, "-t", &self.0.name])?;
        Ok(output.stdout)
    }
}

impl Process for TmuxProcess {
    fn id(&self) -> &str {
        &self.0.name
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
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        Ok(self.0.exit_code.load(Ordering::SeqCst))
    }

    fn stop(&self) -> Result<(), RuntimeError> {
        run_tmux(&["send-keys", "-t", &self.0.name, "C-c"])?;
        let deadline = std::time::Instant::now() + STOP_GRACE;
        while std::time::Instant::now() < deadline {
            if !session_exists(&self.0.name) || sole_pane_dead(&self.0.name) {
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(200));
        }
        self.kill()
    }

    fn kill(&self) -> Result<(), RuntimeError> {
        run_tmux(&["kill-session", "-t", &self.0.name]).map(|_| ())
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

    fn as_attachable(&self) -> Option<&dyn AttachableProcess> {
        Some(self)
    }

    fn as_input_sender(&self) -> Option<&dyn InputSender> {
        Some(self)
    }

    fn as_activity_monitor(&self) -> Option<&dyn ActivityMonitor> {
        Some(self)
    }

    fn as_supervised(&self) -> Option<&dyn Supervised> {
        Some(self)
    }
}

impl OutputCapture for TmuxProcess {
    fn capture_output(&self, lines: usize) -> Result<Vec<u8>, RuntimeError> {
        let n = if lines == 0 { None } else { Some(lines as u32) };
        self.capture(n)
    }
}

impl OutputStreamer for TmuxProcess {
    fn stream_output(
        &self,
        writer: &mut dyn std::io::Write,
        options: StreamOptions,
        cancel: &std::sync::atomic::AtomicBool,
    ) -> Result<(), RuntimeError> {
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            let buffer = self.capture(None)?;
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            buffer.hash(&mut hasher);
            let hash = hasher.finish();
            let changed = {
                let mut last = self.0.last_hash.write().expect("lock poisoned");
                let changed = *last != Some(hash);
                *last = Some(hash);
                changed
            };
            if changed {
                if options.clear_screen {
                    writer.write_all(b"\x1b[2J\x1b[H").map_err(RuntimeError::Io)?;
                }
                writer.write_all(&buffer).map_err(RuntimeError::Io)?;
            }
            if !self.0.running.load(Ordering::SeqCst) {
                return Ok(());
            }
            std::thread::sleep(options.poll_interval);
        }
    }
}

impl AttachableProcess for TmuxProcess {
    fn attach(&self) -> Result<(), RuntimeError> {
        let (cols, rows) = terminal_size();
        if let (Some(cols), Some(rows)) = (cols, rows) {
            let _ = run_tmux(&[
                "resize-window",
                "-t",
                &self.0.name,
                "-x",
                &cols.to_string(),
                "-y",
                &rows.to_string(),
            ]);
        }
        let status = Command::new("tmux")
            .args(["attach-session", "-t", &self.0.name])
            .status()
            .map_err(RuntimeError::Io)?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::NotAvailable {
                name: "tmux".to_string(),
                message: "attach-session failed".to_string(),
            })
        }
    }
}

impl InputSender for TmuxProcess {
    fn send_input(&self, text: &str) -> Result<(), RuntimeError> {
        run_tmux(&["send-keys", "-l", "-t", &self.0.name, text])?;
        run_tmux(&["send-keys", "-t", &self.0.name, "Enter"])?;
        Ok(())
    }
}

impl ActivityMonitor for TmuxProcess {
    fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        amux_proxy::status::read_status(&self.0.status_path).and_then(|s| s.last_activity_at)
    }
}

fn terminal_size() -> (Option<u16>, Option<u16>) {
    (None, None)
}

/// Drives the supervisor's running/working sub-state (spec §4.5,
/// "Supervision (tmux runtime specifics)"): session-exists and pane-dead
/// checks first, then a pid-liveness check on the pane leader (substituting
/// for the spec's exit-status sidecar file, which this crate doesn't
/// implement — see DESIGN.md), then an output-hash compare to report
/// `running` vs `working`. Terminal transitions from a `Done` outcome are
/// left to the runtime's own lifecycle thread (`process.wait()`); this only
/// reports it so the supervisor stops polling.
impl Supervised for TmuxProcess {
    fn supervise(&self) -> Result<SupervisionOutcome, RuntimeError> {
        if !session_exists(&self.0.name) {
            return Ok(SupervisionOutcome::Done {
                success: false,
                reason: "tmux session no longer exists".to_string(),
            });
        }
        if sole_pane_dead(&self.0.name) {
            return Ok(SupervisionOutcome::Done {
                success: true,
                reason: "sole pane exited".to_string(),
            });
        }
        if let Some(pid) = pane_pid(&self.0.name)
            && !crate::pid::is_process_alive(pid)
        {
            return Ok(SupervisionOutcome::Done {
                success: true,
                reason: "pane leader process is no longer alive".to_string(),
            });
        }

        let buffer = self.capture(None)?;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        buffer.hash(&mut hasher);
        let hash = hasher.finish();
        let changed = {
            let mut last = self.0.supervision_hash.write().expect("lock poisoned");
            let changed = *last != Some(hash);
            *last = Some(hash);
            changed
        };
        Ok(SupervisionOutcome::Alive { changed, output_hash: hash })
    }
}
