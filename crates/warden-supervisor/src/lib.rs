//! Lifecycle supervision for a single long-running service.
//!
//! A [`Supervisor`] hosts a [`HostedServer`] on a background run-loop thread
//! of the current process and keeps a durable PID record in the service's
//! working directory. The record is what lets a later invocation (typically
//! a separate CLI process) find the instance to query or stop it:
//!
//! - `start` refuses to run when a live instance is recorded, waits a bounded
//!   time for the server to become live, writes the record, routes `SIGINT`
//!   and `SIGTERM` to an in-process shutdown, and blocks until the run ends.
//! - `stop` terminates the recorded process, escalating from `SIGTERM` to
//!   `SIGKILL` after a grace period, and always clears the record.
//! - `status` reports the recorded process with CPU and memory samples.
//! - `restart` composes the two with a short settle delay in between.
//!
//! Every wait is bounded by [`warden_config::LifecycleTimeouts`]; records
//! naming dead processes are treated as stale and removed on sight.

mod hosted;
mod lifecycle;
mod process;
pub mod telemetry;

pub use hosted::{GreetingServer, HostedServer, HostedServerError};
pub use lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
pub use process::{
    AdminStopChannel, PidRegistry, ProcessControl, ProcessError, ProcessMetrics, RegistryError,
    RunExit, RunState, RunSummary, RunnerError, RunnerHandle, ServerRunner, SignalBridge,
    SignalError, SignalGuard, StatusReport, StopReport, StopSignal, Supervisor,
    SupervisorBuilder, SupervisorError, SupervisorState, SystemProcessControl,
    SystemSignalBridge, TerminateHook, TerminationOutcome, TerminationRequest,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
