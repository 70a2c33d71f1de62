use std::path::PathBuf;

/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "warden_service";

/// Address the hosted server binds to by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the hosted server binds to by default.
pub const DEFAULT_PORT: u16 = 8080;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// How long `start` waits for the hosted server to report liveness.
pub const DEFAULT_LIVENESS_TIMEOUT_MS: u64 = 3_000;

/// How long `stop` waits after a graceful terminate before killing.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;

/// How long `stop` waits after a forceful kill before giving up.
pub const DEFAULT_KILL_PERIOD_MS: u64 = 5_000;

/// Pause between the two halves of `restart`.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

/// Owned service name used where allocation is required (e.g. serde).
pub fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

/// Owned host value used where allocation is required.
pub fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

/// Default working directory: the directory the command was invoked from.
pub fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binary.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}
