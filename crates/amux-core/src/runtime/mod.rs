//! C4: runtime abstraction — pluggable strategies for launching and
//! supervising processes (local, local-detached, tmux).

pub mod errors;
pub mod local;
pub mod local_detached;
pub mod process;
pub mod registry;
pub mod runtime_trait;
pub mod spec;
pub mod tmux;

pub use errors::RuntimeError;
pub use local::LocalRuntime;
pub use local_detached::LocalDetachedRuntime;
pub use process::{
    ActivityMonitor, AttachableProcess, InputSender, OutputCapture, OutputStreamer, Process,
    ProcessState, StreamOptions, Supervised, SupervisionOutcome, MIN_AUTO_CAPTURE_LINES,
};
pub use registry::RuntimeRegistry;
pub use runtime_trait::Runtime;
pub use spec::ExecutionSpec;
pub use tmux::TmuxRuntime;
