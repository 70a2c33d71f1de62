//! Lifecycle commands for the supervised service.
//!
//! - [`types`] defines the command models and IO helpers.
//! - [`error`] captures the error surface exposed to the CLI.
//! - [`console`] echoes supervisor events to the terminal during `start`.
//! - [`controller`] implements the start/stop/restart/status flows.

mod console;
mod controller;
mod error;
mod types;

pub use controller::SystemLifecycle;
pub use error::LifecycleError;
pub use types::{LifecycleCommand, LifecycleContext, LifecycleInvocation, LifecycleOutput};
