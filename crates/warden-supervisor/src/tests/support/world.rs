//! Supervisor harness shared by the unit and behaviour suites.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use warden_config::{LifecycleTimeouts, ServiceIdentity};

use super::RecordingLifecycleReporter;
use crate::hosted::HostedServer;
use crate::process::{
    AdminStopChannel, ProcessControl, RunSummary, Supervisor, SupervisorError, SupervisorState,
    SystemProcessControl,
};

/// Upper bound for any wait performed by a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type RunResult = Result<RunSummary, SupervisorError>;

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Supervisor over a temporary working directory with short timeouts.
pub struct Harness {
    dir: TempDir,
    pub supervisor: Supervisor,
    pub admin: AdminStopChannel,
    pub reporter: Arc<RecordingLifecycleReporter>,
    run: Option<JoinHandle<RunResult>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_control(Arc::new(SystemProcessControl::new()))
    }

    pub fn with_control(control: Arc<dyn ProcessControl>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let identity = ServiceIdentity::new("svc", dir.path()).expect("identity");
        let admin = AdminStopChannel::new();
        let reporter = Arc::new(RecordingLifecycleReporter::default());
        let supervisor = Supervisor::builder(identity)
            .timeouts(Self::timeouts())
            .poll_interval(POLL_INTERVAL)
            .process_control(control)
            .signal_bridge(Arc::new(admin.clone()))
            .reporter(reporter.clone())
            .build();
        Self {
            dir,
            supervisor,
            admin,
            reporter,
            run: None,
        }
    }

    pub fn timeouts() -> LifecycleTimeouts {
        LifecycleTimeouts {
            liveness: Duration::from_secs(2),
            grace_period: Duration::from_secs(1),
            kill_period: Duration::from_secs(1),
            settle_delay: Duration::from_millis(10),
        }
    }

    pub fn pid_path(&self) -> PathBuf {
        self.dir.path().join("svc.pid")
    }

    /// PID currently written to the record, without any liveness check.
    pub fn recorded_pid(&self) -> Option<u32> {
        let content = fs::read_to_string(self.pid_path()).ok()?;
        content.trim().parse().ok()
    }

    pub fn record_pid(&self, pid: u32) {
        fs::write(self.pid_path(), format!("{pid}\n")).expect("write pid file");
    }

    pub fn write_record(&self, content: &str) {
        fs::write(self.pid_path(), content).expect("write pid file");
    }

    /// Runs `start` on a background thread and waits until it is live.
    pub fn start_in_background(&mut self, server: Arc<dyn HostedServer>) -> Result<(), String> {
        let supervisor = self.supervisor.clone();
        self.spawn_run(move || supervisor.start(server))
    }

    /// Runs `restart` on a background thread and waits until it is live.
    pub fn restart_in_background(&mut self, server: Arc<dyn HostedServer>) -> Result<(), String> {
        let supervisor = self.supervisor.clone();
        self.spawn_run(move || supervisor.restart(server))
    }

    fn spawn_run(
        &mut self,
        operation: impl FnOnce() -> RunResult + Send + 'static,
    ) -> Result<(), String> {
        if self.run.is_some() {
            return Err(String::from("a run is already in progress"));
        }
        let handle = thread::spawn(operation);
        let supervisor = self.supervisor.clone();
        let live = wait_until(TEST_TIMEOUT, || {
            supervisor.state() == SupervisorState::Running || handle.is_finished()
        });
        let finished = handle.is_finished();
        self.run = Some(handle);
        match (live, finished) {
            (true, false) => Ok(()),
            (true, true) => Err(format!("run ended early: {:?}", self.join_run())),
            (false, _) => Err(String::from("supervisor never reached the running state")),
        }
    }

    /// Waits for the background run to return.
    pub fn join_run(&mut self) -> RunResult {
        let handle = self.run.take().expect("no background run in progress");
        assert!(
            wait_until(TEST_TIMEOUT, || handle.is_finished()),
            "background run did not return"
        );
        handle.join().expect("run thread panicked")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(handle) = self.run.take() {
            self.admin.request_stop();
            let _ = wait_until(TEST_TIMEOUT, || handle.is_finished());
        }
    }
}
