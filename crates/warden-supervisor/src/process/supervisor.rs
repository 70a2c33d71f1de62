//! Coordinates the PID registry, run loop, signal bridge, and termination.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use warden_config::{LifecycleTimeouts, ServiceIdentity};

use super::control::{ProcessControl, SystemProcessControl};
use super::errors::SupervisorError;
use super::registry::PidRegistry;
use super::runner::{RunExit, RunObserver, RunState, RunnerHandle, ServerRunner};
use super::signals::{SignalBridge, SignalGuard, SystemSignalBridge, TerminateHook};
use super::status::StatusReport;
use super::stop_signal::StopSignal;
use super::terminate::{TerminationOutcome, TerminationPlan, duration_ms, terminate};
use super::{POLL_INTERVAL, PROCESS_TARGET};
use crate::hosted::HostedServer;
use crate::lifecycle::{LifecycleReporter, StructuredLifecycleReporter};

/// Coarse lifecycle of a supervisor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No operation has run yet.
    Idle,
    /// `start` is waiting for the hosted server to become live.
    Starting,
    /// The hosted server is live and the foreground thread is blocked.
    Running,
    /// A stop is in progress.
    Stopping,
    /// The last run or stop has completed.
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

/// Summary returned by `start` once its run has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// PID that hosted the run.
    pub pid: u32,
    /// How the run loop ended; `None` when it outlived its shutdown budget.
    pub exit: Option<RunExit>,
}

impl RunSummary {
    /// Outcome reported to lifecycle observers once the run has ended.
    pub fn outcome(&self) -> TerminationOutcome {
        match self.exit {
            Some(RunExit::Completed) => TerminationOutcome::Graceful,
            Some(RunExit::Failed(_) | RunExit::Panicked) => TerminationOutcome::AlreadyExited,
            None => TerminationOutcome::Forced,
        }
    }
}

/// Result of a successful `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// PID that was stopped.
    pub pid: u32,
    /// How the process went away.
    pub outcome: TerminationOutcome,
}

/// Lifecycle supervisor for one service identity.
///
/// Clones share state, so a clone handed to another thread can stop a run
/// that is blocking in [`Supervisor::start`].
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    identity: ServiceIdentity,
    timeouts: LifecycleTimeouts,
    poll_interval: Duration,
    registry: PidRegistry,
    control: Arc<dyn ProcessControl>,
    bridge: Arc<dyn SignalBridge>,
    reporter: Arc<dyn LifecycleReporter>,
    state: Mutex<SupervisorState>,
    active: Mutex<Option<ActiveRun>>,
    next_run: AtomicU64,
}

struct ActiveRun {
    id: u64,
    pid: u32,
    runner: RunnerHandle,
    stop_signal: StopSignal,
}

struct Launched {
    id: u64,
    pid: u32,
    stop_signal: StopSignal,
    observer: RunObserver,
    guard: SignalGuard,
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    identity: ServiceIdentity,
    timeouts: LifecycleTimeouts,
    poll_interval: Duration,
    control: Arc<dyn ProcessControl>,
    bridge: Arc<dyn SignalBridge>,
    reporter: Arc<dyn LifecycleReporter>,
}

impl SupervisorBuilder {
    /// Overrides the lifecycle timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Overrides the interval used by bounded polling loops.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replaces the process prober and signaller.
    #[must_use]
    pub fn process_control(mut self, control: Arc<dyn ProcessControl>) -> Self {
        self.control = control;
        self
    }

    /// Replaces the termination request source.
    #[must_use]
    pub fn signal_bridge(mut self, bridge: Arc<dyn SignalBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Replaces the lifecycle observer.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn LifecycleReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Finalises the supervisor.
    pub fn build(self) -> Supervisor {
        let registry = PidRegistry::new(self.identity.pid_path(), Arc::clone(&self.control));
        Supervisor {
            inner: Arc::new(Inner {
                identity: self.identity,
                timeouts: self.timeouts,
                poll_interval: self.poll_interval,
                registry,
                control: self.control,
                bridge: self.bridge,
                reporter: self.reporter,
                state: Mutex::new(SupervisorState::Idle),
                active: Mutex::new(None),
                next_run: AtomicU64::new(1),
            }),
        }
    }
}

impl Supervisor {
    /// Starts building a supervisor backed by the host OS.
    pub fn builder(identity: ServiceIdentity) -> SupervisorBuilder {
        SupervisorBuilder {
            identity,
            timeouts: LifecycleTimeouts::default(),
            poll_interval: POLL_INTERVAL,
            control: Arc::new(SystemProcessControl::new()),
            bridge: Arc::new(SystemSignalBridge::new()),
            reporter: Arc::new(StructuredLifecycleReporter::new()),
        }
    }

    /// Builds a supervisor backed by the host OS with the given timeouts.
    pub fn new(identity: ServiceIdentity, timeouts: LifecycleTimeouts) -> Self {
        Self::builder(identity).timeouts(timeouts).build()
    }

    /// Identity this supervisor manages.
    pub fn identity(&self) -> &ServiceIdentity {
        &self.inner.identity
    }

    /// Timeouts applied by lifecycle operations.
    pub fn timeouts(&self) -> LifecycleTimeouts {
        self.inner.timeouts
    }

    /// Current supervisor state.
    pub fn state(&self) -> SupervisorState {
        *self.state_guard()
    }

    /// Run state of the run loop hosted by this supervisor, if any.
    pub fn run_state(&self) -> RunState {
        self.active_guard()
            .as_ref()
            .map_or(RunState::Stopped, |run| run.runner.state())
    }

    /// Hosts `server` in this process until it is stopped.
    ///
    /// Refuses to start when a live instance is already recorded. Once the
    /// server reports liveness the PID record is written and termination
    /// signals are routed to an in-process shutdown; the call then blocks
    /// until the run ends and returns after cleanup.
    pub fn start(&self, server: Arc<dyn HostedServer>) -> Result<RunSummary, SupervisorError> {
        let identity = &self.inner.identity;
        self.inner.reporter.starting(identity);
        let launched = match self.launch(server) {
            Ok(launched) => launched,
            Err(error) => {
                self.inner.reporter.start_failed(identity, &error);
                return Err(error);
            }
        };
        self.inner.reporter.running(identity, launched.pid);

        launched.stop_signal.wait();
        let summary = {
            let mut active = self.active_guard();
            match active.take_if(|run| run.id == launched.id) {
                Some(run) => self.retire(run, self.inner.timeouts.kill_period),
                // Another thread already retired this run.
                None => RunSummary {
                    pid: launched.pid,
                    exit: launched.observer.exit(),
                },
            }
        };
        drop(launched.guard);
        self.inner
            .reporter
            .stopped(identity, summary.pid, summary.outcome());
        Ok(summary)
    }

    /// Stops the recorded instance of this service.
    ///
    /// An instance hosted by this supervisor is shut down in-process.
    /// Otherwise the recorded process receives `SIGTERM`, then `SIGKILL` if
    /// it outlives the grace period; `force` skips straight to the kill. The
    /// PID record is cleared whatever the outcome.
    pub fn stop(&self, force: bool) -> Result<StopReport, SupervisorError> {
        let inner = &self.inner;
        let Some(pid) = inner.registry.resolve()? else {
            info!(
                target: PROCESS_TARGET,
                service = inner.identity.name(),
                "stop requested but service is not running"
            );
            return Err(SupervisorError::NotRunning {
                pid_path: inner.registry.path().to_path_buf(),
            });
        };
        inner.reporter.stopping(&inner.identity, pid);

        if self.hosts(pid) {
            let outcome = match self.shutdown_local(None) {
                Some(_) => TerminationOutcome::Graceful,
                None => TerminationOutcome::AlreadyExited,
            };
            inner.reporter.stopped(&inner.identity, pid, outcome);
            return Ok(StopReport { pid, outcome });
        }
        if pid == std::process::id() {
            return Err(SupervisorError::SelfTermination { pid });
        }

        self.set_state(SupervisorState::Stopping);
        let plan = TerminationPlan {
            grace_period: inner.timeouts.grace_period,
            kill_period: inner.timeouts.kill_period,
            poll_interval: inner.poll_interval,
            force,
        };
        let terminated = terminate(inner.control.as_ref(), pid, plan);
        let cleared = inner.registry.clear_if_owned(pid);
        self.set_state(SupervisorState::Stopped);

        let outcome = terminated?;
        cleared?;
        inner.reporter.stopped(&inner.identity, pid, outcome);
        Ok(StopReport { pid, outcome })
    }

    /// Reports whether the service is running, with metrics when available.
    ///
    /// Never fails: registry errors are reported as [`StatusReport::Unknown`].
    pub fn status(&self) -> StatusReport {
        match self.inner.registry.resolve() {
            Ok(None) => StatusReport::NotRunning,
            Ok(Some(pid)) => {
                let metrics = match self.inner.control.metrics(pid) {
                    Ok(metrics) => Some(metrics),
                    Err(error) => {
                        warn!(
                            target: PROCESS_TARGET,
                            pid,
                            error = %error,
                            "failed to sample process metrics"
                        );
                        None
                    }
                };
                StatusReport::Running { pid, metrics }
            }
            Err(error) => {
                warn!(target: PROCESS_TARGET, error = %error, "status check failed");
                StatusReport::Unknown {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Stops any recorded instance, waits the settle delay, then starts
    /// `server` in this process.
    ///
    /// Blocks like [`Supervisor::start`] once the new run is live.
    pub fn restart(&self, server: Arc<dyn HostedServer>) -> Result<RunSummary, SupervisorError> {
        let previous = match self.stop(false) {
            Ok(report) => Some(report.pid),
            Err(error) if error.is_informational() => None,
            Err(error) => return Err(error),
        };
        self.inner.reporter.restarting(&self.inner.identity, previous);
        if previous.is_some() {
            thread::sleep(self.inner.timeouts.settle_delay);
        }
        self.start(server)
    }

    fn launch(&self, server: Arc<dyn HostedServer>) -> Result<Launched, SupervisorError> {
        let inner = &self.inner;
        // Held until the run is registered so concurrent starts serialise.
        let mut active = self.active_guard();
        if let Some(run) = active.as_ref() {
            return Err(SupervisorError::AlreadyRunning { pid: run.pid });
        }
        if let Some(pid) = inner.registry.resolve()? {
            info!(
                target: PROCESS_TARGET,
                pid,
                "refusing to start: existing instance alive"
            );
            return Err(SupervisorError::AlreadyRunning { pid });
        }
        inner.identity.prepare()?;

        self.set_state(SupervisorState::Starting);
        let stop_signal = StopSignal::new();
        let runner = ServerRunner::new(
            format!("{}-run-loop", inner.identity.name()),
            inner.poll_interval,
        );
        let mut handle = match runner.run_in_background(server, stop_signal.clone()) {
            Ok(handle) => handle,
            Err(error) => {
                self.set_state(SupervisorState::Stopped);
                return Err(error.into());
            }
        };

        if !handle.await_liveness(inner.timeouts.liveness) {
            let error = match handle.exit() {
                Some(exit) => SupervisorError::StartupFailed {
                    reason: exit.to_string(),
                },
                None => SupervisorError::StartupTimeout {
                    timeout_ms: duration_ms(inner.timeouts.liveness),
                },
            };
            self.abandon(&mut handle);
            return Err(error);
        }

        let pid = std::process::id();
        if let Err(error) = inner.registry.persist(pid) {
            self.abandon(&mut handle);
            return Err(error.into());
        }
        let id = inner.next_run.fetch_add(1, Ordering::SeqCst);
        let guard = match inner.bridge.install(self.terminate_hook(id)) {
            Ok(guard) => guard,
            Err(error) => {
                self.abandon(&mut handle);
                return Err(error.into());
            }
        };

        let observer = handle.observer();
        *active = Some(ActiveRun {
            id,
            pid,
            runner: handle,
            stop_signal: stop_signal.clone(),
        });
        self.set_state(SupervisorState::Running);
        info!(
            target: PROCESS_TARGET,
            pid,
            service = inner.identity.name(),
            "service started"
        );
        Ok(Launched {
            id,
            pid,
            stop_signal,
            observer,
            guard,
        })
    }

    /// Unwinds a launch that never became a registered run.
    fn abandon(&self, handle: &mut RunnerHandle) {
        handle.request_stop();
        if !handle.join(self.inner.timeouts.kill_period) {
            warn!(
                target: PROCESS_TARGET,
                "abandoning run loop that ignored the stop request"
            );
        }
        if let Err(error) = self.inner.registry.clear() {
            warn!(target: PROCESS_TARGET, error = %error, "failed to clear pid file");
        }
        self.set_state(SupervisorState::Stopped);
    }

    /// Stops the run hosted by this supervisor, limited to run `id` when
    /// given.
    ///
    /// The active slot stays locked until cleanup finishes, so a restart
    /// cannot launch a new run while the previous one is still retiring.
    fn shutdown_local(&self, id: Option<u64>) -> Option<RunSummary> {
        let mut active = self.active_guard();
        let run = active.take_if(|run| id.is_none_or(|id| run.id == id))?;
        Some(self.retire(run, self.inner.timeouts.grace_period))
    }

    fn retire(&self, mut run: ActiveRun, budget: Duration) -> RunSummary {
        self.set_state(SupervisorState::Stopping);
        run.runner.request_stop();
        if !run.runner.join(budget) {
            warn!(
                target: PROCESS_TARGET,
                pid = run.pid,
                "hosted server ignored the stop request; abandoning its thread"
            );
        }
        if let Err(error) = self.inner.registry.clear_if_owned(run.pid) {
            warn!(target: PROCESS_TARGET, error = %error, "failed to clear pid file");
        }
        run.stop_signal.set();
        self.set_state(SupervisorState::Stopped);
        RunSummary {
            pid: run.pid,
            exit: run.runner.exit(),
        }
    }

    fn hosts(&self, pid: u32) -> bool {
        self.active_guard()
            .as_ref()
            .is_some_and(|run| run.pid == pid)
    }

    /// Hook that retires run `id` only; a late request from an earlier run
    /// must not stop its successor.
    fn terminate_hook(&self, id: u64) -> TerminateHook {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = inner.upgrade() {
                Supervisor { inner }.shutdown_local(Some(id));
            }
        })
    }

    fn set_state(&self, state: SupervisorState) {
        *self.state_guard() = state;
    }

    fn state_guard(&self) -> MutexGuard<'_, SupervisorState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn active_guard(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("identity", &self.inner.identity)
            .field("timeouts", &self.inner.timeouts)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
