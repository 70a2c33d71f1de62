//! Operating-system seam for probing and signalling service processes.

use std::thread;
use std::time::Duration;

use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;

use super::status::ProcessMetrics;

/// Window between the two CPU samples taken for a status report.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(250);

/// Termination requests the supervisor can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    /// Cooperative request (`SIGTERM`); the target may clean up first.
    Graceful,
    /// Uncatchable kill (`SIGKILL`).
    Forceful,
}

impl TerminationRequest {
    /// Name of the signal used to deliver the request.
    #[must_use]
    pub fn signal_name(self) -> &'static str {
        match self {
            Self::Graceful => "SIGTERM",
            Self::Forceful => "SIGKILL",
        }
    }
}

/// Probes and signals processes by PID.
pub trait ProcessControl: Send + Sync {
    /// Reports whether a process with this PID exists.
    ///
    /// A process owned by another user still counts as alive.
    fn is_alive(&self, pid: u32) -> Result<bool, ProcessError>;

    /// Delivers a termination request.
    fn send(&self, pid: u32, request: TerminationRequest) -> Result<(), ProcessError>;

    /// Samples state, CPU usage, and resident memory for a process.
    fn metrics(&self, pid: u32) -> Result<ProcessMetrics, ProcessError>;
}

/// Errors reported while probing or signalling a process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process does not exist.
    #[error("no process with pid {pid}")]
    NoSuchProcess { pid: u32 },
    /// The caller lacks permission to signal the process.
    #[error("permission denied signalling pid {pid}")]
    PermissionDenied { pid: u32 },
    /// The PID cannot be represented as an OS process identifier.
    #[error("pid {pid} is out of range")]
    InvalidPid { pid: u32 },
    /// Probing the process failed for another reason.
    #[cfg(unix)]
    #[error("failed to probe pid {pid}: {source}")]
    Probe {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
    /// Delivering a signal failed for another reason.
    #[error("failed to send {signal} to pid {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: &'static str,
        reason: String,
    },
    /// The process could not be sampled.
    #[error("metrics unavailable for pid {pid}")]
    MetricsUnavailable { pid: u32 },
}

/// [`ProcessControl`] backed by the host operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessControl;

impl SystemProcessControl {
    /// Builds the system-backed controller.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ProcessControl for SystemProcessControl {
    fn is_alive(&self, pid: u32) -> Result<bool, ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;

        if pid == 0 {
            return Ok(false);
        }
        match kill(to_nix_pid(pid)?, None) {
            Ok(()) => Ok(true),
            Err(Errno::EPERM) => Ok(true),
            Err(Errno::ESRCH) | Err(Errno::ECHILD) => Ok(false),
            Err(errno) => Err(ProcessError::Probe { pid, source: errno }),
        }
    }

    fn send(&self, pid: u32, request: TerminationRequest) -> Result<(), ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};

        let signal = match request {
            TerminationRequest::Graceful => Signal::SIGTERM,
            TerminationRequest::Forceful => Signal::SIGKILL,
        };
        match kill(to_nix_pid(pid)?, signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ProcessError::NoSuchProcess { pid }),
            Err(Errno::EPERM) => Err(ProcessError::PermissionDenied { pid }),
            Err(errno) => Err(ProcessError::Signal {
                pid,
                signal: request.signal_name(),
                reason: errno.desc().to_string(),
            }),
        }
    }

    fn metrics(&self, pid: u32) -> Result<ProcessMetrics, ProcessError> {
        sample_metrics(pid)
    }
}

#[cfg(not(unix))]
impl ProcessControl for SystemProcessControl {
    fn is_alive(&self, pid: u32) -> Result<bool, ProcessError> {
        if pid == 0 {
            return Ok(false);
        }
        let target = SysPid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        Ok(system.process(target).is_some())
    }

    fn send(&self, pid: u32, request: TerminationRequest) -> Result<(), ProcessError> {
        let target = SysPid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        let process = system
            .process(target)
            .ok_or(ProcessError::NoSuchProcess { pid })?;
        let delivered = match request {
            TerminationRequest::Graceful => process
                .kill_with(sysinfo::Signal::Term)
                .unwrap_or_else(|| process.kill()),
            TerminationRequest::Forceful => process.kill(),
        };
        if delivered {
            Ok(())
        } else {
            Err(ProcessError::Signal {
                pid,
                signal: request.signal_name(),
                reason: String::from("the operating system rejected the request"),
            })
        }
    }

    fn metrics(&self, pid: u32) -> Result<ProcessMetrics, ProcessError> {
        sample_metrics(pid)
    }
}

#[cfg(unix)]
fn to_nix_pid(pid: u32) -> Result<nix::unistd::Pid, ProcessError> {
    i32::try_from(pid)
        .map(nix::unistd::Pid::from_raw)
        .map_err(|_| ProcessError::InvalidPid { pid })
}

/// Takes two CPU samples a short window apart; a single refresh always
/// reports zero usage.
fn sample_metrics(pid: u32) -> Result<ProcessMetrics, ProcessError> {
    let target = SysPid::from_u32(pid);
    let refresh = ProcessRefreshKind::nothing().with_cpu().with_memory();
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), true, refresh);
    thread::sleep(CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), true, refresh);

    let process = system
        .process(target)
        .ok_or(ProcessError::MetricsUnavailable { pid })?;
    Ok(ProcessMetrics {
        state: process.status().to_string(),
        cpu_percent: process.cpu_usage(),
        memory_bytes: process.memory(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::{Child, Command};

    use super::*;

    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep")
    }

    #[test]
    fn own_process_is_alive_and_sampled() {
        let control = SystemProcessControl::new();
        let pid = std::process::id();
        assert!(control.is_alive(pid).expect("probe self"));
        let metrics = control.metrics(pid).expect("sample self");
        assert!(metrics.memory_bytes > 0);
        assert!(!metrics.state.is_empty());
    }

    #[test]
    fn pid_zero_is_never_alive() {
        assert!(!SystemProcessControl::new().is_alive(0).expect("probe"));
    }

    #[test]
    fn out_of_range_pid_is_rejected() {
        let error = SystemProcessControl::new()
            .send(u32::MAX, TerminationRequest::Graceful)
            .expect_err("pid should be rejected");
        assert!(matches!(error, ProcessError::InvalidPid { .. }));
    }

    #[test]
    fn reaped_child_is_not_alive_and_cannot_be_signalled() {
        let control = SystemProcessControl::new();
        let mut child = spawn_sleeper();
        let pid = child.id();
        control
            .send(pid, TerminationRequest::Forceful)
            .expect("kill child");
        child.wait().expect("reap child");

        assert!(!control.is_alive(pid).expect("probe"));
        let error = control
            .send(pid, TerminationRequest::Graceful)
            .expect_err("signal should fail");
        assert!(matches!(error, ProcessError::NoSuchProcess { .. }));
    }
}
