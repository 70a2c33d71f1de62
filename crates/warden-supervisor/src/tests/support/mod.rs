//! Test harness utilities for the supervisor suites.

mod children;
mod reporter;
mod servers;
mod world;

pub use children::ExternalProcess;
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use servers::{ScriptedServer, ServerScript};
pub use world::{Harness, TEST_TIMEOUT, wait_until};
