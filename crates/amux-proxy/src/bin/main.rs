//! Entry point for the `amux-proxy` binary: wraps a command for the
//! `local`/`local-detached`/`tmux` runtimes, capturing its output under
//! `.amux/sessions/<id>/` (or, with `--foreground`, inheriting the
//! caller's stdio directly).
//!
//! Usage: `amux-proxy <session-id> [--foreground] -- <command> [args...]`

use std::process::ExitCode;

use amux_paths::AmuxPaths;
use amux_proxy::{run, run_foreground, ProxySpec};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(String, bool, Vec<String>), String> {
    let session_id = args.next().ok_or_else(|| "missing <session-id>".to_string())?;

    let mut foreground = false;
    let mut command = Vec::new();
    let mut found_separator = false;
    for arg in args {
        if found_separator {
            command.push(arg);
        } else if arg == "--" {
            found_separator = true;
        } else if arg == "--foreground" {
            foreground = true;
        } else {
            return Err(format!("unexpected argument '{arg}' before '--'"));
        }
    }

    if !found_separator || command.is_empty() {
        return Err("missing command after `--`".to_string());
    }
    Ok((session_id, foreground, command))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let (session_id, foreground, command) = match parse_args(std::env::args().skip(1)) {
        Ok(v) => v,
        Err(message) => {
            eprintln!("amux-proxy: {message}");
            eprintln!("usage: amux-proxy <session-id> [--foreground] -- <command> [args...]");
            return ExitCode::from(2);
        }
    };

    let paths = match AmuxPaths::resolve() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("amux-proxy: {e}");
            return ExitCode::from(2);
        }
    };

    let status_file = paths.session_status_file(&session_id);
    let run_id = amux_proxy::status::next_run_id(&status_file);
    let run_dir = paths.session_run_dir(&session_id, run_id);

    let spec = ProxySpec::new(
        run_dir.clone(),
        paths.session_run_log_file(&session_id, run_id),
        status_file,
        paths.session_socket_file(&session_id),
        command,
    );

    let result = if foreground { run_foreground(spec).await } else { run(spec).await };

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("amux-proxy: {e}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_splits_session_id_and_command() {
        let args = vec!["sess-1".to_string(), "--".to_string(), "echo".to_string(), "hi".to_string()];
        let (session_id, foreground, command) = parse_args(args.into_iter()).unwrap();
        assert_eq!(session_id, "sess-1");
        assert!(!foreground);
        assert_eq!(command, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn parse_args_detects_foreground_flag() {
        let args = vec![
            "sess-1".to_string(),
            "--foreground".to_string(),
            "--".to_string(),
            "echo".to_string(),
            "hi".to_string(),
        ];
        let (session_id, foreground, command) = parse_args(args.into_iter()).unwrap();
        assert_eq!(session_id, "sess-1");
        assert!(foreground);
        assert_eq!(command, vec!["echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn parse_args_rejects_missing_separator() {
        let args = vec!["sess-1".to_string(), "echo".to_string()];
        assert!(parse_args(args.into_iter()).is_err());
    }

    #[test]
    fn parse_args_rejects_unknown_flag_before_separator() {
        let args = vec!["sess-1".to_string(), "--bogus".to_string(), "--".to_string(), "echo".to_string()];
        assert!(parse_args(args.into_iter()).is_err());
    }
}
