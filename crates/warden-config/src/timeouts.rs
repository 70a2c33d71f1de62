use std::time::Duration;

use crate::defaults::{
    DEFAULT_GRACE_PERIOD_MS, DEFAULT_KILL_PERIOD_MS, DEFAULT_LIVENESS_TIMEOUT_MS,
    DEFAULT_SETTLE_DELAY_MS,
};

/// Bounded waits applied by the supervisor's lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    /// Budget for the hosted server to report liveness during `start`.
    pub liveness: Duration,
    /// Wait after a graceful terminate before escalating to a kill.
    pub grace_period: Duration,
    /// Wait after a forceful kill before reporting a termination failure.
    pub kill_period: Duration,
    /// Pause between `stop` and `start` during `restart`.
    pub settle_delay: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            liveness: Duration::from_millis(DEFAULT_LIVENESS_TIMEOUT_MS),
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            kill_period: Duration::from_millis(DEFAULT_KILL_PERIOD_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}
