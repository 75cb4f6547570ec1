//! I/O proxy: wraps a child command, capturing its output to a log file, a
//! replayable segment ring served over a Unix socket, and a status file
//! (component C3).

pub mod broadcast;
pub mod errors;
pub mod proc;
pub mod ring;
pub mod status;

pub use errors::ProxyError;
pub use proc::{run, run_foreground, ProxySpec};
pub use status::{ProxyStatus, RunState};
