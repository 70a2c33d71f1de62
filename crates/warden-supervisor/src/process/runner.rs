//! Runs a hosted server on a background thread and tracks its run state.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use super::PROCESS_TARGET;
use super::stop_signal::StopSignal;
use crate::hosted::HostedServer;

/// Lifecycle of the run-loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run loop is active.
    Stopped,
    /// The run loop is starting and has not reported liveness yet.
    Starting,
    /// The hosted server is serving.
    Running,
    /// A stop was requested and the run loop has not exited yet.
    StopRequested,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::StopRequested => "stop_requested",
        })
    }
}

/// How the run loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// The hosted server returned normally.
    Completed,
    /// The hosted server returned an error.
    Failed(String),
    /// The hosted server panicked.
    Panicked,
}

impl fmt::Display for RunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("hosted server exited"),
            Self::Failed(reason) => write!(f, "hosted server failed: {reason}"),
            Self::Panicked => f.write_str("hosted server panicked"),
        }
    }
}

/// Errors raised while starting the run loop.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The run-loop thread could not be spawned.
    #[error("failed to spawn run-loop thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Spawns hosted servers onto named run-loop threads.
#[derive(Debug, Clone)]
pub struct ServerRunner {
    thread_name: String,
    poll_interval: Duration,
}

impl ServerRunner {
    /// Builds a runner whose threads carry `thread_name`.
    pub fn new(thread_name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            thread_name: thread_name.into(),
            poll_interval,
        }
    }

    /// Starts `server` on a background thread and returns immediately.
    ///
    /// `stop_signal` fires when the run loop exits for any reason, including
    /// a failure or a panic inside the server.
    pub fn run_in_background(
        &self,
        server: Arc<dyn HostedServer>,
        stop_signal: StopSignal,
    ) -> Result<RunnerHandle, RunnerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(RunState::Starting),
            exit: Mutex::new(None),
        });
        let thread_shared = Arc::clone(&shared);
        let thread_server = Arc::clone(&server);
        let thread = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_loop(thread_server.as_ref(), &thread_shared, &stop_signal))
            .map_err(|source| RunnerError::Spawn {
                name: self.thread_name.clone(),
                source,
            })?;
        Ok(RunnerHandle {
            server,
            shared,
            thread: Some(thread),
            poll_interval: self.poll_interval,
        })
    }
}

struct Shared {
    state: Mutex<RunState>,
    exit: Mutex<Option<RunExit>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn exit(&self) -> MutexGuard<'_, Option<RunExit>> {
        self.exit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_loop(server: &dyn HostedServer, shared: &Shared, stop_signal: &StopSignal) {
    info!(target: PROCESS_TARGET, "run loop started");
    let exit = match panic::catch_unwind(AssertUnwindSafe(|| server.run())) {
        Ok(Ok(())) => RunExit::Completed,
        Ok(Err(error)) => {
            error!(target: PROCESS_TARGET, error = %error, "hosted server failed");
            RunExit::Failed(error.to_string())
        }
        Err(_) => {
            error!(target: PROCESS_TARGET, "hosted server panicked");
            RunExit::Panicked
        }
    };
    info!(target: PROCESS_TARGET, exit = %exit, "run loop exited");
    *shared.exit() = Some(exit);
    *shared.state() = RunState::Stopped;
    stop_signal.set();
}

/// Handle to an active run loop.
pub struct RunnerHandle {
    server: Arc<dyn HostedServer>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl RunnerHandle {
    /// Current run state.
    pub fn state(&self) -> RunState {
        *self.shared.state()
    }

    /// How the run loop ended, once it has.
    pub fn exit(&self) -> Option<RunExit> {
        self.shared.exit().clone()
    }

    /// Waits until the server reports it is serving.
    ///
    /// Returns `false` when the run loop exits first or `timeout` elapses.
    pub fn await_liveness(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.server.is_serving() {
                let mut state = self.shared.state();
                if *state == RunState::Starting {
                    *state = RunState::Running;
                }
                return true;
            }
            if self.is_finished() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Read-only view of the run that outlives this handle.
    pub(crate) fn observer(&self) -> RunObserver {
        RunObserver(Arc::clone(&self.shared))
    }

    /// Asks the hosted server to stop. Safe to call repeatedly.
    pub fn request_stop(&self) {
        {
            let mut state = self.shared.state();
            if *state == RunState::Stopped {
                return;
            }
            *state = RunState::StopRequested;
        }
        self.server.request_stop();
    }

    /// Waits up to `timeout` for the run-loop thread to finish.
    ///
    /// Returns `true` once the thread has been joined. A thread that outlives
    /// the timeout is left running and `false` is returned.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let Some(thread) = self.thread.as_ref() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    target: PROCESS_TARGET,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "run loop did not exit in time"
                );
                return false;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
        if let Some(thread) = self.thread.take() {
            // The loop catches server panics, so join only fails on a bug here.
            if thread.join().is_err() {
                error!(target: PROCESS_TARGET, "run-loop thread panicked");
            }
        }
        true
    }

    fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Shared view of a run's outcome, usable after the handle is retired.
#[derive(Clone)]
pub(crate) struct RunObserver(Arc<Shared>);

impl RunObserver {
    pub(crate) fn exit(&self) -> Option<RunExit> {
        self.0.exit().clone()
    }
}

impl fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("state", &self.state())
            .field("exit", &self.exit())
            .finish_non_exhaustive()
    }
}
