//! CLI entrypoint for the Warden service supervisor.
//!
//! The binary delegates to [`warden_cli::run`], which loads configuration,
//! parses the lifecycle subcommand, and drives the supervisor.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Unlocked handles: lifecycle events may print from the signal listener
    // thread while `start` blocks on this one.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    warden_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
