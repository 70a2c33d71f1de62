//! Routes external termination requests to the supervisor's local shutdown.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Callback invoked when a termination request arrives.
pub type TerminateHook = Arc<dyn Fn() + Send + Sync>;

/// Errors reported while installing a signal bridge.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Registering the signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
    /// The signal listener thread could not be spawned.
    #[error("failed to spawn signal listener: {source}")]
    Listener {
        #[source]
        source: io::Error,
    },
}

/// Installs a termination hook for the duration of one run.
///
/// The hook fires at most once per installation; further requests are
/// logged and ignored. Dropping the returned guard uninstalls the hook.
pub trait SignalBridge: Send + Sync {
    /// Routes termination requests to `hook` until the guard is dropped.
    fn install(&self, hook: TerminateHook) -> Result<SignalGuard, SignalError>;
}

/// Keeps a [`SignalBridge`] installation alive.
pub struct SignalGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
    listener: Option<JoinHandle<()>>,
}

impl SignalGuard {
    fn new(release: impl FnOnce() + Send + 'static, listener: Option<JoinHandle<()>>) -> Self {
        Self {
            release: Some(Box::new(release)),
            listener,
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        if let Some(listener) = self.listener.take() {
            // The listener exits once released; a hook it is still running
            // finishes first.
            let _ = listener.join();
        }
    }
}

impl fmt::Debug for SignalGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalGuard")
            .field("listening", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

/// Wraps a hook so only the first request runs it.
struct OnceHook {
    fired: AtomicBool,
    hook: TerminateHook,
}

impl OnceHook {
    fn new(hook: TerminateHook) -> Arc<Self> {
        Arc::new(Self {
            fired: AtomicBool::new(false),
            hook,
        })
    }

    fn fire(&self, source: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            info!(
                target: PROCESS_TARGET,
                source,
                "termination request ignored; shutdown already in progress"
            );
            return false;
        }
        info!(target: PROCESS_TARGET, source, "termination request received");
        (self.hook)();
        true
    }
}

/// Bridge listening for `SIGINT` and `SIGTERM`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSignalBridge;

impl SystemSignalBridge {
    /// Builds the OS signal bridge.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl SignalBridge for SystemSignalBridge {
    fn install(&self, hook: TerminateHook) -> Result<SignalGuard, SignalError> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;
        use signal_hook::low_level::signal_name;

        let mut signals =
            Signals::new([SIGTERM, SIGINT]).map_err(|source| SignalError::Install { source })?;
        let handle = signals.handle();
        let once = OnceHook::new(hook);
        let listener = std::thread::Builder::new()
            .name(String::from("warden-signals"))
            .spawn(move || {
                for signal in signals.forever() {
                    once.fire(signal_name(signal).unwrap_or("signal"));
                }
            })
            .map_err(|source| SignalError::Listener { source })?;
        Ok(SignalGuard::new(move || handle.close(), Some(listener)))
    }
}

#[cfg(not(unix))]
impl SignalBridge for SystemSignalBridge {
    fn install(&self, _hook: TerminateHook) -> Result<SignalGuard, SignalError> {
        tracing::warn!(
            target: PROCESS_TARGET,
            "signal handling is unavailable on this platform; use the stop command"
        );
        Ok(SignalGuard::new(|| {}, None))
    }
}

/// In-process bridge for administrative stop requests.
///
/// Embedders and tests call [`AdminStopChannel::request_stop`] instead of
/// delivering an OS signal. The most recent installation receives requests;
/// releasing an older guard leaves a newer hook in place.
#[derive(Clone, Default)]
pub struct AdminStopChannel {
    slot: Arc<Mutex<Option<Arc<OnceHook>>>>,
}

impl AdminStopChannel {
    /// Builds a channel with no hook installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a stop request to the installed hook.
    ///
    /// Returns `true` when this request ran the hook; `false` when nothing is
    /// installed or an earlier request already did.
    pub fn request_stop(&self) -> bool {
        let hook = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        hook.is_some_and(|hook| hook.fire("admin"))
    }

    /// Reports whether a run is currently listening.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl SignalBridge for AdminStopChannel {
    fn install(&self, hook: TerminateHook) -> Result<SignalGuard, SignalError> {
        let installed = OnceHook::new(hook);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&installed));
        let release = Arc::clone(&self.slot);
        Ok(SignalGuard::new(
            move || {
                let mut slot = release.lock().unwrap_or_else(PoisonError::into_inner);
                if slot
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &installed))
                {
                    slot.take();
                }
            },
            None,
        ))
    }
}

impl fmt::Debug for AdminStopChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminStopChannel")
            .field("installed", &self.is_installed())
            .finish()
    }
}
