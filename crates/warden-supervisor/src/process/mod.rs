use std::time::Duration;

mod control;
mod errors;
mod files;
mod registry;
mod runner;
mod signals;
mod status;
mod stop_signal;
mod supervisor;
mod terminate;

pub use control::{ProcessControl, ProcessError, SystemProcessControl, TerminationRequest};
pub use errors::SupervisorError;
pub use registry::{PidRegistry, RegistryError};
pub use runner::{RunExit, RunState, RunnerError, RunnerHandle, ServerRunner};
pub use signals::{
    AdminStopChannel, SignalBridge, SignalError, SignalGuard, SystemSignalBridge, TerminateHook,
};
pub use status::{ProcessMetrics, StatusReport};
pub use stop_signal::StopSignal;
pub use supervisor::{RunSummary, StopReport, Supervisor, SupervisorBuilder, SupervisorState};
pub use terminate::TerminationOutcome;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);
