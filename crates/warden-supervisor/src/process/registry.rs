//! Durable record of which process currently hosts a service.
//!
//! The record is a single decimal PID plus newline at
//! `<working_dir>/<name>.pid`. Reads self-heal: a malformed record or one
//! naming a dead process is removed and reported as absent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::PROCESS_TARGET;
use super::control::{ProcessControl, ProcessError};
use super::files::write_pid_record;

/// Errors raised while reading or mutating the PID record.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Reading the record failed for a reason other than absence.
    #[error("failed to read pid file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing the record failed.
    #[error("failed to write pid file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Removing the record failed.
    #[error("failed to remove pid file '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The recorded process could not be probed.
    #[error("failed to check recorded process {pid}: {source}")]
    Probe {
        pid: u32,
        #[source]
        source: ProcessError,
    },
}

/// Reads and writes the PID record for one service identity.
#[derive(Clone)]
pub struct PidRegistry {
    path: PathBuf,
    control: Arc<dyn ProcessControl>,
}

impl PidRegistry {
    /// Builds a registry over the record at `path`.
    pub fn new(path: impl Into<PathBuf>, control: Arc<dyn ProcessControl>) -> Self {
        Self {
            path: path.into(),
            control,
        }
    }

    /// Location of the PID record.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Returns the recorded PID when it names a live process.
    ///
    /// Malformed or stale records are removed before reporting `None`.
    pub fn resolve(&self) -> Result<Option<u32>, RegistryError> {
        let Some(content) = self.read()? else {
            return Ok(None);
        };
        let Some(pid) = parse_pid(&content) else {
            warn!(
                target: PROCESS_TARGET,
                file = %self.path.display(),
                "pid file is malformed; removing it"
            );
            self.clear()?;
            return Ok(None);
        };
        match self.control.is_alive(pid) {
            Ok(true) => Ok(Some(pid)),
            Ok(false) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid,
                    file = %self.path.display(),
                    "recorded process is gone; removing stale pid file"
                );
                self.clear()?;
                Ok(None)
            }
            Err(source) => Err(RegistryError::Probe { pid, source }),
        }
    }

    /// Records `pid`, replacing any previous record atomically.
    pub fn persist(&self, pid: u32) -> Result<(), RegistryError> {
        write_pid_record(&self.path, pid).map_err(|source| {
            RegistryError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %self.path.display(),
            "pid file written"
        );
        Ok(())
    }

    /// Removes the record. Absence is not an error.
    pub fn clear(&self) -> Result<(), RegistryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    "pid file removed"
                );
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Cleanup {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Removes the record only when it still names `pid`.
    ///
    /// Returns `true` when a record was removed. Used on shutdown so a
    /// departing instance never deletes a successor's record.
    pub fn clear_if_owned(&self, pid: u32) -> Result<bool, RegistryError> {
        let owned = self
            .read()?
            .as_deref()
            .and_then(parse_pid)
            .is_some_and(|recorded| recorded == pid);
        if owned {
            self.clear()?;
        }
        Ok(owned)
    }

    fn read(&self) -> Result<Option<Vec<u8>>, RegistryError> {
        match fs::read(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RegistryError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl std::fmt::Debug for PidRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PidRegistry")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Accepts a positive decimal PID that the platform's signed `pid_t` can hold.
fn parse_pid(content: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(content).ok()?;
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid != 0 && i32::try_from(*pid).is_ok())
}
