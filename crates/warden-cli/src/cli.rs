//! CLI argument definitions for the `warden` binary.
//!
//! Configuration flags (`--name`, `--port`, `--working-dir` and friends) are
//! split off before these definitions see the arguments, so only the
//! lifecycle subcommand and its own flags are declared here.

use clap::{Parser, Subcommand};

/// Command-line interface for the Warden service supervisor.
#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Starts, stops, and inspects a supervised service",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// The lifecycle operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Lifecycle subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Starts the service in the foreground and blocks until it stops.
    Start,
    /// Stops the recorded instance of the service.
    Stop {
        /// Skips the graceful phase and kills the process immediately.
        #[arg(long)]
        force: bool,
    },
    /// Stops any recorded instance, then starts the service in the foreground.
    Restart,
    /// Prints whether the service is running, with resource usage.
    Status {
        /// Emits the status as a JSON document.
        #[arg(long)]
        json: bool,
    },
}
