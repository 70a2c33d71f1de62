//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::sync::Mutex;

use warden_config::ServiceIdentity;

use crate::lifecycle::LifecycleReporter;
use crate::process::{SupervisorError, TerminationOutcome};

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Starting,
    Running(u32),
    StartFailed(String),
    Stopping(u32),
    Stopped(u32, TerminationOutcome),
    Restarting(Option<u32>),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn starting(&self, _identity: &ServiceIdentity) {
        self.record(LifecycleEvent::Starting);
    }

    fn running(&self, _identity: &ServiceIdentity, pid: u32) {
        self.record(LifecycleEvent::Running(pid));
    }

    fn start_failed(&self, _identity: &ServiceIdentity, error: &SupervisorError) {
        self.record(LifecycleEvent::StartFailed(error.to_string()));
    }

    fn stopping(&self, _identity: &ServiceIdentity, pid: u32) {
        self.record(LifecycleEvent::Stopping(pid));
    }

    fn stopped(&self, _identity: &ServiceIdentity, pid: u32, outcome: TerminationOutcome) {
        self.record(LifecycleEvent::Stopped(pid, outcome));
    }

    fn restarting(&self, _identity: &ServiceIdentity, previous_pid: Option<u32>) {
        self.record(LifecycleEvent::Restarting(previous_pid));
    }
}
