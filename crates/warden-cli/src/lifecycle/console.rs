//! Terminal echo of supervisor lifecycle events.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use warden_config::ServiceIdentity;
use warden_supervisor::{
    LifecycleReporter, StructuredLifecycleReporter, SupervisorError, TerminationOutcome,
};

/// Prints one line per lifecycle event and forwards it to the structured log.
///
/// `start` and `restart` block inside the supervisor, so progress has to be
/// reported from the observer rather than after the call returns.
pub(crate) struct ConsoleReporter<W> {
    out: Mutex<W>,
    structured: StructuredLifecycleReporter,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            structured: StructuredLifecycleReporter::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, args: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // Console echo is best effort; the structured log carries the event.
        let _ = out.write_fmt(args);
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}

impl<W: Write + Send> LifecycleReporter for ConsoleReporter<W> {
    fn starting(&self, identity: &ServiceIdentity) {
        self.structured.starting(identity);
        self.line(format_args!(
            "starting {} in {}",
            identity.name(),
            identity.working_dir().display()
        ));
    }

    fn running(&self, identity: &ServiceIdentity, pid: u32) {
        self.structured.running(identity, pid);
        self.line(format_args!(
            "{} running with pid {pid}; logging to {}",
            identity.name(),
            identity.log_path().display()
        ));
    }

    fn start_failed(&self, identity: &ServiceIdentity, error: &SupervisorError) {
        // The error itself is printed to stderr by the runtime.
        self.structured.start_failed(identity, error);
    }

    fn stopping(&self, identity: &ServiceIdentity, pid: u32) {
        self.structured.stopping(identity, pid);
        self.line(format_args!("stopping {} (pid {pid})", identity.name()));
    }

    fn stopped(&self, identity: &ServiceIdentity, pid: u32, outcome: TerminationOutcome) {
        self.structured.stopped(identity, pid, outcome);
        self.line(format_args!(
            "{} stopped (pid {pid}, {outcome})",
            identity.name()
        ));
    }

    fn restarting(&self, identity: &ServiceIdentity, previous_pid: Option<u32>) {
        self.structured.restarting(identity, previous_pid);
        match previous_pid {
            Some(pid) => self.line(format_args!(
                "{} was running (pid {pid}); starting it again",
                identity.name()
            )),
            None => self.line(format_args!(
                "{} was not running; starting it",
                identity.name()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ServiceIdentity {
        ServiceIdentity::new("svc", "/srv/warden").expect("identity")
    }

    fn rendered(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf8 output")
    }

    #[test]
    fn running_line_names_pid_and_log_file() {
        let reporter = ConsoleReporter::new(Vec::new());
        reporter.running(&identity(), 42);
        let output = rendered(reporter);
        assert_eq!(output, "svc running with pid 42; logging to /srv/warden/svc.log\n");
    }

    #[test]
    fn restart_reports_whether_an_instance_was_running() {
        let reporter = ConsoleReporter::new(Vec::new());
        reporter.restarting(&identity(), Some(7));
        reporter.restarting(&identity(), None);
        let output = rendered(reporter);
        assert!(output.contains("svc was running (pid 7); starting it again"));
        assert!(output.contains("svc was not running; starting it"));
    }

    #[test]
    fn start_failures_are_left_to_the_error_path() {
        let reporter = ConsoleReporter::new(Vec::new());
        let error = SupervisorError::AlreadyRunning { pid: 9 };
        reporter.start_failed(&identity(), &error);
        assert!(rendered(reporter).is_empty());
    }
}
