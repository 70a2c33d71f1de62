//! Hosted servers with scripted behaviour.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::hosted::{HostedServer, HostedServerError};

const TICK: Duration = Duration::from_millis(5);

/// Behaviour a [`ScriptedServer`] follows when run.
#[derive(Debug, Clone, Copy)]
pub enum ServerScript {
    /// Serves until asked to stop.
    ServeUntilStopped,
    /// Blocks until asked to stop without ever reporting liveness.
    NeverServe,
    /// Returns an error straight away.
    FailImmediately,
    /// Panics straight away.
    PanicImmediately,
    /// Serves, then panics once asked to stop.
    PanicOnStop,
    /// Serves, then keeps running for this long after a stop request.
    IgnoreStopFor(Duration),
}

/// [`HostedServer`] driven by a [`ServerScript`].
#[derive(Debug)]
pub struct ScriptedServer {
    script: ServerScript,
    stop_requested: AtomicBool,
    serving: AtomicBool,
}

impl ScriptedServer {
    pub fn new(script: ServerScript) -> Self {
        Self {
            script,
            stop_requested: AtomicBool::new(false),
            serving: AtomicBool::new(false),
        }
    }

    fn wait_for_stop(&self) {
        while !self.stop_requested.load(Ordering::SeqCst) {
            thread::sleep(TICK);
        }
    }
}

impl HostedServer for ScriptedServer {
    fn run(&self) -> Result<(), HostedServerError> {
        match self.script {
            ServerScript::ServeUntilStopped => {
                self.serving.store(true, Ordering::SeqCst);
                self.wait_for_stop();
            }
            ServerScript::NeverServe => self.wait_for_stop(),
            ServerScript::FailImmediately => {
                return Err(HostedServerError::Other {
                    message: String::from("scripted failure"),
                });
            }
            ServerScript::PanicImmediately => panic!("scripted panic"),
            ServerScript::PanicOnStop => {
                self.serving.store(true, Ordering::SeqCst);
                self.wait_for_stop();
                panic!("scripted panic on stop");
            }
            ServerScript::IgnoreStopFor(delay) => {
                self.serving.store(true, Ordering::SeqCst);
                self.wait_for_stop();
                let deadline = Instant::now() + delay;
                while Instant::now() < deadline {
                    thread::sleep(TICK);
                }
            }
        }
        self.serving.store(false, Ordering::SeqCst);
        self.stop_requested.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}
