//! Derives the on-disk identity of a supervised service.
//!
//! The PID record and log file live side by side in the service's working
//! directory. Both the foreground supervisor and any later `stop`/`status`
//! invocation derive the same paths from `(working_dir, name)`, which is what
//! lets a separate CLI process find a previously started instance.

use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// Immutable identity of a supervised service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    working_dir: PathBuf,
    pid_path: PathBuf,
    log_path: PathBuf,
}

impl ServiceIdentity {
    /// Builds an identity from a service name and working directory.
    ///
    /// The working directory is made absolute so that paths remain stable if
    /// the process later changes its current directory.
    pub fn new(name: impl Into<String>, working_dir: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let name = name.into();
        validate_name(&name)?;
        let working_dir = path::absolute(working_dir.as_ref()).map_err(|source| {
            IdentityError::WorkingDirectory {
                path: working_dir.as_ref().to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            pid_path: working_dir.join(format!("{name}.pid")),
            log_path: working_dir.join(format!("{name}.log")),
            working_dir,
            name,
        })
    }

    /// Derives the identity from the shared configuration.
    pub fn from_config(config: &Config) -> Result<Self, IdentityError> {
        Self::new(config.name(), config.working_dir())
    }

    /// Creates the working directory when it does not exist yet.
    pub fn prepare(&self) -> Result<(), IdentityError> {
        fs::create_dir_all(&self.working_dir).map_err(|source| IdentityError::WorkingDirectory {
            path: self.working_dir.clone(),
            source,
        })
    }

    /// Service name used to derive artefact file names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute working directory holding the runtime artefacts.
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_path()
    }

    /// Path to the PID record.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the append-mode log file.
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }
}

fn validate_name(name: &str) -> Result<(), IdentityError> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty")
    } else if name.contains(['/', '\\']) {
        Some("name must not contain path separators")
    } else if name == "." || name == ".." {
        Some("name must not be a relative path component")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(IdentityError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Errors raised while deriving a service identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The service name cannot be used as a file stem.
    #[error("invalid service name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    /// The working directory could not be resolved or created.
    #[error("failed to prepare working directory '{path}': {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
