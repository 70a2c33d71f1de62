//! Escalating termination of a recorded service process.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use super::control::{ProcessControl, ProcessError, TerminationRequest};

/// Budgets applied while terminating a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TerminationPlan {
    pub grace_period: Duration,
    pub kill_period: Duration,
    pub poll_interval: Duration,
    /// Skip the graceful phase and kill immediately.
    pub force: bool,
}

/// How a terminated process went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had already exited before any signal was delivered.
    AlreadyExited,
    /// The process exited after the graceful request.
    Graceful,
    /// The process had to be killed.
    Forced,
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyExited => "already exited",
            Self::Graceful => "graceful",
            Self::Forced => "forced",
        })
    }
}

/// Errors raised while terminating a process.
#[derive(Debug, Error)]
pub(crate) enum TerminationError {
    #[error("permission denied terminating pid {pid}")]
    PermissionDenied { pid: u32 },
    #[error("process {pid} still alive {waited_ms} ms after SIGKILL")]
    Survived { pid: u32, waited_ms: u64 },
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Terminates `pid`, escalating from a graceful request to a kill.
///
/// Every wait is bounded by the plan; the call never blocks indefinitely.
pub(crate) fn terminate(
    control: &dyn ProcessControl,
    pid: u32,
    plan: TerminationPlan,
) -> Result<TerminationOutcome, TerminationError> {
    if !plan.force {
        match deliver(control, pid, TerminationRequest::Graceful)? {
            Delivery::Gone => return Ok(TerminationOutcome::AlreadyExited),
            Delivery::Sent => {}
        }
        if wait_for_exit(control, pid, plan.grace_period, plan.poll_interval)? {
            info!(target: PROCESS_TARGET, pid, "process exited gracefully");
            return Ok(TerminationOutcome::Graceful);
        }
        warn!(
            target: PROCESS_TARGET,
            pid,
            grace_ms = duration_ms(plan.grace_period),
            "process ignored graceful termination; escalating to SIGKILL"
        );
    }

    match deliver(control, pid, TerminationRequest::Forceful)? {
        // Exited between the last probe and the kill.
        Delivery::Gone if plan.force => return Ok(TerminationOutcome::AlreadyExited),
        Delivery::Gone => return Ok(TerminationOutcome::Graceful),
        Delivery::Sent => {}
    }
    if wait_for_exit(control, pid, plan.kill_period, plan.poll_interval)? {
        info!(target: PROCESS_TARGET, pid, "process killed");
        return Ok(TerminationOutcome::Forced);
    }
    Err(TerminationError::Survived {
        pid,
        waited_ms: duration_ms(plan.kill_period),
    })
}

enum Delivery {
    Sent,
    Gone,
}

fn deliver(
    control: &dyn ProcessControl,
    pid: u32,
    request: TerminationRequest,
) -> Result<Delivery, TerminationError> {
    match control.send(pid, request) {
        Ok(()) => {
            info!(
                target: PROCESS_TARGET,
                pid,
                signal = request.signal_name(),
                "termination signal sent"
            );
            Ok(Delivery::Sent)
        }
        Err(ProcessError::NoSuchProcess { .. }) => Ok(Delivery::Gone),
        Err(ProcessError::PermissionDenied { pid }) => {
            Err(TerminationError::PermissionDenied { pid })
        }
        Err(error) => Err(error.into()),
    }
}

/// Polls until the process disappears or `budget` elapses.
fn wait_for_exit(
    control: &dyn ProcessControl,
    pid: u32,
    budget: Duration,
    poll_interval: Duration,
) -> Result<bool, TerminationError> {
    let deadline = Instant::now() + budget;
    loop {
        if !control.is_alive(pid)? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use mockall::Sequence;
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;
    use crate::process::test_support::MockControl;

    const PID: u32 = 4242;

    fn plan(force: bool) -> TerminationPlan {
        TerminationPlan {
            grace_period: Duration::from_millis(60),
            kill_period: Duration::from_millis(60),
            poll_interval: Duration::from_millis(5),
            force,
        }
    }

    #[test]
    fn graceful_exit_skips_the_kill() {
        let mut control = MockControl::new();
        control
            .expect_send()
            .with(eq(PID), eq(TerminationRequest::Graceful))
            .once()
            .returning(|_, _| Ok(()));
        control.expect_is_alive().returning(|_| Ok(false));

        let outcome = terminate(&control, PID, plan(false)).expect("terminate");
        assert_eq!(outcome, TerminationOutcome::Graceful);
    }

    #[test]
    fn stubborn_process_is_killed_after_grace_period() {
        let killed = Arc::new(AtomicBool::new(false));
        let mut control = MockControl::new();
        let mut seq = Sequence::new();
        control
            .expect_send()
            .with(eq(PID), eq(TerminationRequest::Graceful))
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let on_kill = Arc::clone(&killed);
        control
            .expect_send()
            .with(eq(PID), eq(TerminationRequest::Forceful))
            .once()
            .in_sequence(&mut seq)
            .returning(move |_, _| {
                on_kill.store(true, Ordering::SeqCst);
                Ok(())
            });
        let probe = Arc::clone(&killed);
        control
            .expect_is_alive()
            .returning(move |_| Ok(!probe.load(Ordering::SeqCst)));

        let outcome = terminate(&control, PID, plan(false)).expect("terminate");
        assert_eq!(outcome, TerminationOutcome::Forced);
    }

    #[test]
    fn force_skips_the_graceful_request() {
        let mut control = MockControl::new();
        control
            .expect_send()
            .with(eq(PID), eq(TerminationRequest::Forceful))
            .once()
            .returning(|_, _| Ok(()));
        control.expect_is_alive().returning(|_| Ok(false));

        let outcome = terminate(&control, PID, plan(true)).expect("terminate");
        assert_eq!(outcome, TerminationOutcome::Forced);
    }

    #[rstest]
    #[case::graceful(false)]
    #[case::forced(true)]
    fn vanished_process_is_already_exited(#[case] force: bool) {
        let mut control = MockControl::new();
        control
            .expect_send()
            .returning(|pid, _| Err(ProcessError::NoSuchProcess { pid }));

        let outcome = terminate(&control, PID, plan(force)).expect("terminate");
        assert_eq!(outcome, TerminationOutcome::AlreadyExited);
    }

    #[test]
    fn permission_denied_does_not_escalate() {
        let mut control = MockControl::new();
        control
            .expect_send()
            .with(eq(PID), eq(TerminationRequest::Graceful))
            .once()
            .returning(|pid, _| Err(ProcessError::PermissionDenied { pid }));

        let error = terminate(&control, PID, plan(false)).expect_err("should fail");
        assert!(matches!(error, TerminationError::PermissionDenied { pid: PID }));
    }

    #[test]
    fn process_surviving_the_kill_is_reported() {
        let mut control = MockControl::new();
        control.expect_send().times(2).returning(|_, _| Ok(()));
        control.expect_is_alive().returning(|_| Ok(true));

        let started = Instant::now();
        let error = terminate(&control, PID, plan(false)).expect_err("should fail");
        assert!(matches!(error, TerminationError::Survived { pid: PID, .. }));
        assert!(started.elapsed() < Duration::from_secs(2), "waits are bounded");
    }
}
