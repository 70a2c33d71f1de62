//! Structured reporting for supervisor lifecycle events.

use std::sync::Arc;

use warden_config::ServiceIdentity;

use crate::process::{SupervisorError, TerminationOutcome};

/// Observer notified as the supervisor moves through its lifecycle.
///
/// Events are delivered synchronously on the thread performing the
/// operation, so implementations should return quickly.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before the hosted server is launched.
    fn starting(&self, identity: &ServiceIdentity);

    /// Invoked once the server is live and the PID record is written.
    fn running(&self, identity: &ServiceIdentity, pid: u32);

    /// Invoked when `start` fails.
    fn start_failed(&self, identity: &ServiceIdentity, error: &SupervisorError);

    /// Invoked before a recorded process is terminated.
    fn stopping(&self, identity: &ServiceIdentity, pid: u32);

    /// Invoked after a process has gone away.
    fn stopped(&self, identity: &ServiceIdentity, pid: u32, outcome: TerminationOutcome);

    /// Invoked when `restart` moves from its stop phase to its start phase.
    fn restarting(&self, identity: &ServiceIdentity, previous_pid: Option<u32>);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn starting(&self, identity: &ServiceIdentity) {
        (**self).starting(identity);
    }

    fn running(&self, identity: &ServiceIdentity, pid: u32) {
        (**self).running(identity, pid);
    }

    fn start_failed(&self, identity: &ServiceIdentity, error: &SupervisorError) {
        (**self).start_failed(identity, error);
    }

    fn stopping(&self, identity: &ServiceIdentity, pid: u32) {
        (**self).stopping(identity, pid);
    }

    fn stopped(&self, identity: &ServiceIdentity, pid: u32, outcome: TerminationOutcome) {
        (**self).stopped(identity, pid, outcome);
    }

    fn restarting(&self, identity: &ServiceIdentity, previous_pid: Option<u32>) {
        (**self).restarting(identity, previous_pid);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn starting(&self, identity: &ServiceIdentity) {
        tracing::info!(
            target: "warden_supervisor::lifecycle",
            event = "starting",
            service = identity.name(),
            working_dir = %identity.working_dir().display(),
            "starting service"
        );
    }

    fn running(&self, identity: &ServiceIdentity, pid: u32) {
        tracing::info!(
            target: "warden_supervisor::lifecycle",
            event = "running",
            service = identity.name(),
            pid,
            "service running"
        );
    }

    fn start_failed(&self, identity: &ServiceIdentity, error: &SupervisorError) {
        tracing::error!(
            target: "warden_supervisor::lifecycle",
            event = "start_failed",
            service = identity.name(),
            error = %error,
            "service failed to start"
        );
    }

    fn stopping(&self, identity: &ServiceIdentity, pid: u32) {
        tracing::info!(
            target: "warden_supervisor::lifecycle",
            event = "stopping",
            service = identity.name(),
            pid,
            "stopping service"
        );
    }

    fn stopped(&self, identity: &ServiceIdentity, pid: u32, outcome: TerminationOutcome) {
        tracing::info!(
            target: "warden_supervisor::lifecycle",
            event = "stopped",
            service = identity.name(),
            pid,
            outcome = ?outcome,
            "service stopped"
        );
    }

    fn restarting(&self, identity: &ServiceIdentity, previous_pid: Option<u32>) {
        tracing::info!(
            target: "warden_supervisor::lifecycle",
            event = "restarting",
            service = identity.name(),
            previous_pid = ?previous_pid,
            "restarting service"
        );
    }
}
