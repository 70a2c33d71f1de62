//! One-shot latch that keeps the foreground supervisor alive while the hosted
//! server runs.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Single-fire notification shared between the run loop, the signal bridge,
/// and the thread blocked in [`crate::Supervisor::start`].
///
/// Once set the signal stays set; a fresh signal is created for every run.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal and wakes every waiter.
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn set(&self) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut fired = lock_flag(lock);
        if *fired {
            return false;
        }
        *fired = true;
        cvar.notify_all();
        true
    }

    /// Reports whether the signal has fired.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *lock_flag(&self.inner.0)
    }

    /// Blocks until the signal fires.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let guard = lock_flag(lock);
        let _fired = cvar
            .wait_while(guard, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the signal fires or the timeout elapses.
    ///
    /// Returns `true` when the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock_flag(lock);
        let (fired, _) = cvar
            .wait_timeout_while(guard, timeout, |fired| !*fired)
            .unwrap_or_else(PoisonError::into_inner);
        *fired
    }
}

fn lock_flag(lock: &Mutex<bool>) -> MutexGuard<'_, bool> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
