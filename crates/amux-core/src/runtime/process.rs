//! The process contract and its optional capability extensions (spec §4.4).
//!
//! Rust has no structural type assertion like a Go interface check, so each
//! capability is queried through an `as_*` method on `Process` that returns
//! `None` by default; a runtime's concrete process type overrides only the
//! methods for capabilities it actually has. This keeps the "god interface"
//! out of the base trait while still letting call sites feature-detect.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::runtime::errors::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited,
}

pub struct StreamOptions {
    pub poll_interval: std::time::Duration,
    pub clear_screen: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_millis(500),
            clear_screen: false,
        }
    }
}

/// Base contract every runtime's process handle satisfies.
pub trait Process: Send + Sync {
    fn id(&self) -> &str;
    fn state(&self) -> ProcessState;

    /// Block until the process exits, returning its exit code.
    fn wait(&self) -> Result<i32, RuntimeError>;

    /// Graceful stop (SIGTERM / `C-c` depending on runtime).
    fn stop(&self) -> Result<(), RuntimeError>;

    /// Forced stop (SIGKILL / `kill-session`).
    fn kill(&self) -> Result<(), RuntimeError>;

    /// Errors with `ProcessAlreadyDone`'s inverse — `NotFound`-like — if
    /// still running; per spec this is "error if still running".
    fn exit_code(&self) -> Result<i32, RuntimeError>;

    fn start_time(&self) -> DateTime<Utc>;

    fn metadata(&self) -> &HashMap<String, String>;

    fn as_output_capture(&self) -> Option<&dyn OutputCapture> {
        None
    }

    fn as_output_streamer(&self) -> Option<&dyn OutputStreamer> {
        None
    }

    fn as_attachable(&self) -> Option<&dyn AttachableProcess> {
        None
    }

    fn as_input_sender(&self) -> Option<&dyn InputSender> {
        None
    }

    fn as_activity_monitor(&self) -> Option<&dyn ActivityMonitor> {
        None
    }

    fn as_supervised(&self) -> Option<&dyn Supervised> {
        None
    }
}

/// `lines == 0` means "auto": the runtime decides, with a minimum of 30
/// (spec §8 boundary behaviour).
pub trait OutputCapture {
    fn capture_output(&self, lines: usize) -> Result<Vec<u8>, RuntimeError>;
}

pub const MIN_AUTO_CAPTURE_LINES: usize = 30;

/// Emits the current screenful on change (hash-compared) at `poll_interval`.
pub trait OutputStreamer {
    fn stream_output(
        &self,
        writer: &mut dyn std::io::Write,
        options: StreamOptions,
        cancel: &std::sync::atomic::AtomicBool,
    ) -> Result<(), RuntimeError>;
}

pub trait AttachableProcess {
    fn attach(&self) -> Result<(), RuntimeError>;
}

pub trait InputSender {
    fn send_input(&self, text: &str) -> Result<(), RuntimeError>;
}

pub trait ActivityMonitor {
    fn last_activity_at(&self) -> Option<DateTime<Utc>>;
}

/// One step of a runtime-specific supervision cycle (spec §4.5, tmux
/// runtime specifics): the session supervisor polls this instead of
/// reimplementing per-runtime liveness/output checks itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// Still running. `changed` reports whether captured output differs
    /// from the previous poll; `output_hash` is the hash observed this
    /// cycle, stored back by the caller for the next comparison.
    Alive { changed: bool, output_hash: u64 },
    /// The underlying process has actually finished, even though the OS
    /// process/tmux session handle hasn't reported it yet.
    Done { success: bool, reason: String },
}

pub trait Supervised {
    fn supervise(&self) -> Result<SupervisionOutcome, RuntimeError>;
}
