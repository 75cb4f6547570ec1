//! Stale-PID liveness check via `kill(pid, 0)` (ground:
//! `kild-daemon::pid::is_process_alive`). Used by the tmux runtime's
//! supervision cycle (`TmuxProcess::supervise`) to tell whether the pane's
//! leader process is still alive before trusting the pane as "running".

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// `ESRCH` means the process is gone; `EPERM` means it exists but is owned
/// by someone else, which still counts as alive for our purposes.
pub fn is_process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        assert!(!is_process_alive(i32::MAX as u32 - 1));
    }
}
