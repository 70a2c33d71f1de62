//! External processes standing in for instances started by another CLI run.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Child process reaped in the background so it never lingers as a zombie.
pub struct ExternalProcess {
    pid: u32,
    child: Arc<Mutex<Option<Child>>>,
}

impl ExternalProcess {
    /// Spawns a process that exits on `SIGTERM`.
    pub fn cooperative() -> Self {
        let child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("spawn sleep");
        Self::watch(child)
    }

    /// Spawns a process that ignores `SIGTERM` and only dies to `SIGKILL`.
    pub fn stubborn() -> Self {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; echo ready; exec sleep 60"])
            .stdout(Stdio::piped())
            .spawn()
            .expect("spawn sh");
        let stdout = child.stdout.take().expect("child stdout");
        let mut line = String::new();
        BufReader::new(stdout)
            .read_line(&mut line)
            .expect("read readiness line");
        assert_eq!(line.trim(), "ready", "trap should be installed");
        Self::watch(child)
    }

    fn watch(child: Child) -> Self {
        let pid = child.id();
        let child = Arc::new(Mutex::new(Some(child)));
        let reaper = Arc::clone(&child);
        thread::spawn(move || {
            loop {
                {
                    let mut slot = reaper.lock().expect("child mutex poisoned");
                    let Some(child) = slot.as_mut() else { return };
                    if matches!(child.try_wait(), Ok(Some(_)) | Err(_)) {
                        slot.take();
                        return;
                    }
                }
                thread::sleep(REAP_INTERVAL);
            }
        });
        Self { pid, child }
    }

    /// PID of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Waits until the child has exited and been reaped.
    pub fn wait_exited(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.child.lock().expect("child mutex poisoned").is_none() {
                return true;
            }
            thread::sleep(REAP_INTERVAL);
        }
        false
    }
}

impl Drop for ExternalProcess {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.child.lock()
            && let Some(mut child) = slot.take()
        {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
