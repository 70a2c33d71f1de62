//! Defines the unified error surface for supervisor operations.

use std::path::PathBuf;

use thiserror::Error;

use warden_config::IdentityError;

use super::control::ProcessError;
use super::registry::RegistryError;
use super::runner::RunnerError;
use super::signals::SignalError;
use super::terminate::TerminationError;

/// Errors surfaced by [`crate::Supervisor`] operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A live instance already owns the PID record.
    #[error("service already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded for the live instance.
        pid: u32,
    },
    /// No live instance is recorded.
    #[error("service is not running (no live pid in '{pid_path}')")]
    NotRunning {
        /// PID record that was consulted.
        pid_path: PathBuf,
    },
    /// The hosted server did not report liveness in time.
    #[error("hosted server did not become live within {timeout_ms} ms")]
    StartupTimeout {
        /// Liveness budget that elapsed.
        timeout_ms: u64,
    },
    /// The hosted server exited before reporting liveness.
    #[error("hosted server failed during startup: {reason}")]
    StartupFailed {
        /// Why the run loop ended.
        reason: String,
    },
    /// Reading or writing the PID record failed.
    #[error("pid registry failure: {source}")]
    Storage {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// The recorded process survived a forceful kill.
    #[error("process {pid} could not be terminated within {waited_ms} ms of SIGKILL")]
    TerminationFailure {
        /// PID that survived.
        pid: u32,
        /// Kill budget that elapsed.
        waited_ms: u64,
    },
    /// The recorded process belongs to another user.
    #[error("permission denied terminating pid {pid}")]
    PermissionDenied {
        /// PID that could not be signalled.
        pid: u32,
    },
    /// The record names this process, but this supervisor is not hosting it.
    #[error("refusing to terminate own process {pid}")]
    SelfTermination {
        /// The caller's own PID.
        pid: u32,
    },
    /// Deriving or preparing the service identity failed.
    #[error("invalid service identity: {source}")]
    Identity {
        /// Underlying identity error.
        #[source]
        source: IdentityError,
    },
    /// The run-loop thread could not be started.
    #[error("failed to start run loop: {source}")]
    Spawn {
        /// Underlying runner error.
        #[source]
        source: RunnerError,
    },
    /// Installing termination handlers failed.
    #[error("failed to install termination handlers: {source}")]
    Signals {
        /// Underlying bridge error.
        #[source]
        source: SignalError,
    },
    /// Probing or signalling a process failed.
    #[error("process control failure: {source}")]
    Process {
        /// Underlying process error.
        #[source]
        source: ProcessError,
    },
}

impl SupervisorError {
    /// Reports whether the error describes a benign state rather than a
    /// failure, such as stopping a service that is already stopped.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::NotRunning { .. })
    }
}

impl From<RegistryError> for SupervisorError {
    fn from(source: RegistryError) -> Self {
        Self::Storage { source }
    }
}

impl From<IdentityError> for SupervisorError {
    fn from(source: IdentityError) -> Self {
        Self::Identity { source }
    }
}

impl From<RunnerError> for SupervisorError {
    fn from(source: RunnerError) -> Self {
        Self::Spawn { source }
    }
}

impl From<SignalError> for SupervisorError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}

impl From<ProcessError> for SupervisorError {
    fn from(source: ProcessError) -> Self {
        Self::Process { source }
    }
}

impl From<TerminationError> for SupervisorError {
    fn from(source: TerminationError) -> Self {
        match source {
            TerminationError::PermissionDenied { pid } => Self::PermissionDenied { pid },
            TerminationError::Survived { pid, waited_ms } => {
                Self::TerminationFailure { pid, waited_ms }
            }
            TerminationError::Process(source) => Self::Process { source },
        }
    }
}
