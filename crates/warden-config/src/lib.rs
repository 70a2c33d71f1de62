//! Shared configuration for the Warden supervisor and its command-line front end.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, an optional
//! configuration file, `WARDEN_*` environment variables, and finally command
//! line flags. The supervisor itself only interprets the service name and
//! working directory (to derive its [`ServiceIdentity`]) and the lifecycle
//! timeouts; host and port are handed to the hosted server untouched.

mod defaults;
mod identity;
mod logging;
mod timeouts;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_GRACE_PERIOD_MS, DEFAULT_HOST, DEFAULT_KILL_PERIOD_MS, DEFAULT_LIVENESS_TIMEOUT_MS,
    DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_SERVICE_NAME, DEFAULT_SETTLE_DELAY_MS,
    default_host, default_log_filter_string, default_log_format, default_service_name,
    default_working_dir,
};
pub use identity::{IdentityError, ServiceIdentity};
pub use logging::{LogFormat, LogFormatParseError};
pub use timeouts::LifecycleTimeouts;

/// Flags accepted by the configuration loader ahead of the subcommand.
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--name",
    "--host",
    "--port",
    "--working-dir",
    "--log-filter",
    "--log-format",
    "--liveness-timeout-ms",
    "--grace-period-ms",
    "--kill-period-ms",
    "--settle-delay-ms",
];

/// Resolved configuration for a supervised service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct Config {
    /// Service name; the PID and log file names derive from it.
    #[ortho_config(default = default_service_name())]
    pub name: String,
    /// Address the hosted server binds to.
    #[ortho_config(default = default_host())]
    pub host: String,
    /// Port the hosted server binds to.
    #[ortho_config(default = DEFAULT_PORT)]
    pub port: u16,
    /// Directory holding the PID record and log file.
    #[ortho_config(default = default_working_dir())]
    pub working_dir: PathBuf,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Liveness budget for `start`, in milliseconds.
    #[ortho_config(default = DEFAULT_LIVENESS_TIMEOUT_MS)]
    pub liveness_timeout_ms: u64,
    /// Graceful termination budget for `stop`, in milliseconds.
    #[ortho_config(default = DEFAULT_GRACE_PERIOD_MS)]
    pub grace_period_ms: u64,
    /// Forceful kill budget for `stop`, in milliseconds.
    #[ortho_config(default = DEFAULT_KILL_PERIOD_MS)]
    pub kill_period_ms: u64,
    /// Pause between the halves of `restart`, in milliseconds.
    #[ortho_config(default = DEFAULT_SETTLE_DELAY_MS)]
    pub settle_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            port: DEFAULT_PORT,
            working_dir: default_working_dir(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            kill_period_ms: DEFAULT_KILL_PERIOD_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Config {
    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host handed to the hosted server.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port handed to the hosted server.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Working directory as configured (possibly relative).
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_path()
    }

    /// Log filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Lifecycle timeouts converted to durations.
    pub fn timeouts(&self) -> LifecycleTimeouts {
        LifecycleTimeouts {
            liveness: Duration::from_millis(self.liveness_timeout_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
            kill_period: Duration::from_millis(self.kill_period_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    /// Derives the service identity from the name and working directory.
    pub fn identity(&self) -> Result<ServiceIdentity, IdentityError> {
        ServiceIdentity::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_match_lifecycle_defaults() {
        assert_eq!(Config::default().timeouts(), LifecycleTimeouts::default());
    }

    #[test]
    fn timeouts_follow_configured_milliseconds() {
        let config = Config {
            grace_period_ms: 250,
            kill_period_ms: 100,
            ..Config::default()
        };
        let timeouts = config.timeouts();
        assert_eq!(timeouts.grace_period, Duration::from_millis(250));
        assert_eq!(timeouts.kill_period, Duration::from_millis(100));
    }

    #[test]
    fn identity_uses_configured_name() {
        let config = Config {
            name: String::from("svc"),
            working_dir: PathBuf::from("/srv/warden"),
            ..Config::default()
        };
        let identity = config.identity().expect("identity");
        assert_eq!(identity.pid_path(), Path::new("/srv/warden/svc.pid"));
    }
}
