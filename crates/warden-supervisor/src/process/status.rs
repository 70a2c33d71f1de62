//! Status snapshots returned by [`crate::Supervisor::status`].

use std::fmt;

use serde::Serialize;

/// Resource usage sampled from a running service process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    /// Scheduler state as reported by the operating system (e.g. `Sleeping`).
    pub state: String,
    /// CPU usage in percent of a single core over the sampling window.
    pub cpu_percent: f32,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
}

impl ProcessMetrics {
    /// Resident set size in mebibytes.
    #[must_use]
    pub fn memory_mib(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Outcome of a status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusReport {
    /// No live process is recorded for the service.
    NotRunning,
    /// A live process is recorded.
    ///
    /// Metrics are absent when the process could not be sampled, for example
    /// because it exited between the liveness probe and the sample.
    Running {
        pid: u32,
        metrics: Option<ProcessMetrics>,
    },
    /// The PID record could not be read.
    Unknown { reason: String },
}

impl StatusReport {
    /// PID of the running service, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match self {
            Self::Running { pid, .. } => Some(*pid),
            Self::NotRunning | Self::Unknown { .. } => None,
        }
    }

    /// Reports whether a live process is recorded.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => f.write_str("not running"),
            Self::Running { pid, .. } => write!(f, "running (pid {pid})"),
            Self::Unknown { reason } => write!(f, "unknown ({reason})"),
        }
    }
}
