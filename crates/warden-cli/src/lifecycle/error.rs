//! Error types for service lifecycle commands.

use std::io;

use thiserror::Error;
use warden_config::IdentityError;
use warden_supervisor::{RunExit, SupervisorError, TelemetryError};

/// Errors raised while executing lifecycle commands.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid service identity: {0}")]
    Identity(#[from] IdentityError),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("'{command}' failed: {source}")]
    Supervisor {
        command: super::LifecycleCommand,
        #[source]
        source: SupervisorError,
    },
    #[error("service run ended abnormally: {exit}")]
    RunFailed { exit: RunExit },
    #[error("service pid {pid} outlived its shutdown budget")]
    ShutdownIncomplete { pid: u32 },
    #[error("failed to render status: {0}")]
    Render(#[source] serde_json::Error),
    #[error("failed to write lifecycle output: {0}")]
    Io(#[source] io::Error),
}
