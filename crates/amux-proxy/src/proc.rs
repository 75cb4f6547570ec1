//! Spawns the wrapped command and wires its output to the log file, the
//! segment ring/broadcast socket, and the status file (spec §4.3).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing::{info, warn};

use crate::broadcast::{serve, BroadcastHub};
use crate::errors::ProxyError;
use crate::status::{next_run_id, read_status, write_status, ProxyStatus};

const DEFAULT_RING_CAPACITY: usize = 4096;

/// Where a run's artifacts live and what command to execute.
pub struct ProxySpec {
    pub run_dir: PathBuf,
    pub log_file: PathBuf,
    pub status_file: PathBuf,
    pub socket_file: PathBuf,
    pub command: Vec<String>,
}

impl ProxySpec {
    pub fn new(run_dir: PathBuf, log_file: PathBuf, status_file: PathBuf, socket_file: PathBuf, command: Vec<String>) -> Self {
        Self {
            run_dir,
            log_file,
            status_file,
            socket_file,
            command,
        }
    }
}

/// Spawn the command, capture its combined stdout/stderr to `log_file`,
/// fan it out over the broadcast socket, and keep `status_file` current.
/// Returns the child's exit code (or `-1` if it was killed by a signal).
pub async fn run(spec: ProxySpec) -> Result<i32, ProxyError> {
    if spec.command.is_empty() {
        return Err(ProxyError::InvalidCommand {
            message: "command must have at least one argument".to_string(),
        });
    }

    std::fs::create_dir_all(&spec.run_dir)?;

    let run_id = next_run_id(&spec.status_file);
    let mut child = Command::new(&spec.command[0])
        .args(&spec.command[1..])
        .current_dir(&spec.run_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProxyError::SpawnFailed { source })?;

    let pid = child.id().unwrap_or(0);
    let mut status = ProxyStatus::started(run_id, pid);
    write_status(&spec.status_file, &status)?;
    info!(event = "proxy.proc.started", run_id, pid, command = ?spec.command);

    let forwarder = spawn_signal_forwarder(pid as i32);

    let hub = BroadcastHub::new(DEFAULT_RING_CAPACITY);
    let socket_path = spec.socket_file.clone();
    let hub_for_socket = Arc::clone(&hub);
    let socket_task = tokio::spawn(async move {
        if let Err(e) = serve(&socket_path, hub_for_socket).await {
            warn!(event = "proxy.broadcast.serve_failed", error = %e);
        }
    });

    let mut log_file = tokio::fs::File::create(&spec.log_file).await?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let stdout_hub = Arc::clone(&hub);
    let stderr_hub = Arc::clone(&hub);

    let (stdout_tx, mut stdout_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let stdout_tx2 = stdout_tx.clone();

    let stdout_task = tokio::spawn(pump_lines(stdout, stdout_hub, stdout_tx));
    let stderr_task = tokio::spawn(pump_lines(stderr, stderr_hub, stdout_tx2));

    while let Some(line) = stdout_rx.recv().await {
        log_file.write_all(&line).await?;
        touch_status(&spec.status_file, &mut status)?;
    }

    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let exit_status = child.wait().await?;
    forwarder.abort();
    let exit_code = exit_status.code().unwrap_or(-1);

    status.mark_exited(exit_code);
    write_status(&spec.status_file, &status)?;
    info!(event = "proxy.proc.exited", run_id, exit_code);

    socket_task.abort();

    Ok(exit_code)
}

/// Like [`run`], but for the `--foreground` path: stdio is inherited
/// directly from the caller (no log file, no broadcast socket — there is
/// no second attacher to serve, the caller already holds the terminal).
/// Still records `status_file` so `amux session` commands can see the PID
/// and exit code. SIGINT/SIGTERM received by this process are forwarded
/// to the child, same as in captured mode.
pub async fn run_foreground(spec: ProxySpec) -> Result<i32, ProxyError> {
    if spec.command.is_empty() {
        return Err(ProxyError::InvalidCommand {
            message: "command must have at least one argument".to_string(),
        });
    }

    std::fs::create_dir_all(&spec.run_dir)?;

    let run_id = next_run_id(&spec.status_file);
    let mut child = Command::new(&spec.command[0])
        .args(&spec.command[1..])
        .current_dir(&spec.run_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ProxyError::SpawnFailed { source })?;

    let pid = child.id().unwrap_or(0);
    let mut status = ProxyStatus::started(run_id, pid);
    write_status(&spec.status_file, &status)?;
    info!(event = "proxy.proc.started", run_id, pid, foreground = true, command = ?spec.command);

    let forwarder = spawn_signal_forwarder(pid as i32);

    let exit_status = child.wait().await?;
    forwarder.abort();
    let exit_code = exit_status.code().unwrap_or(-1);

    status.mark_exited(exit_code);
    write_status(&spec.status_file, &status)?;
    info!(event = "proxy.proc.exited", run_id, exit_code, foreground = true);

    Ok(exit_code)
}

/// Relay SIGINT/SIGTERM delivered to this process on to the child's pid,
/// so a user's Ctrl-C (or an `amux session stop`/`kill` signalling this
/// proxy) reaches the wrapped command instead of only killing the proxy.
fn spawn_signal_forwarder(pid: i32) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = match unix_signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                warn!(event = "proxy.proc.signal_setup_failed", error = %e);
                return;
            }
        };
        let mut sigterm = match unix_signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(event = "proxy.proc.signal_setup_failed", error = %e);
                return;
            }
        };
        loop {
            let sig = tokio::select! {
                _ = sigint.recv() => Signal::SIGINT,
                _ = sigterm.recv() => Signal::SIGTERM,
            };
            if signal::kill(Pid::from_raw(pid), sig).is_err() {
                break;
            }
        }
    })
}

async fn pump_lines(
    reader: impl tokio::io::AsyncRead + Unpin,
    hub: Arc<BroadcastHub>,
    sink: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
) {
    let mut lines = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match lines.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                hub.feed(&buf);
                if sink.send(buf.clone()).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

fn touch_status(status_path: &Path, status: &mut ProxyStatus) -> Result<(), ProxyError> {
    status.touch_activity();
    write_status(status_path, status)
}

/// Re-read the current status for a session, used by session attach/logs
/// commands that live outside this process.
pub fn current_status(status_path: &Path) -> Option<ProxyStatus> {
    read_status(status_path)
}
