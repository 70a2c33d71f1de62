//! Command models and output plumbing shared by the lifecycle handlers.

use std::fmt;
use std::io::Write;

use warden_config::Config;

use super::LifecycleError;
use crate::cli::CliCommand;

/// Supported lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Stop { force: bool },
    Restart,
    Status { json: bool },
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => formatter.write_str("start"),
            Self::Stop { .. } => formatter.write_str("stop"),
            Self::Restart => formatter.write_str("restart"),
            Self::Status { .. } => formatter.write_str("status"),
        }
    }
}

/// A parsed subcommand ready for the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleInvocation {
    pub command: LifecycleCommand,
}

impl From<CliCommand> for LifecycleInvocation {
    fn from(command: CliCommand) -> Self {
        let command = match command {
            CliCommand::Start => LifecycleCommand::Start,
            CliCommand::Stop { force } => LifecycleCommand::Stop { force },
            CliCommand::Restart => LifecycleCommand::Restart,
            CliCommand::Status { json } => LifecycleCommand::Status { json },
        };
        Self { command }
    }
}

/// Resolved configuration handed to every lifecycle handler.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleContext<'a> {
    pub config: &'a Config,
}

/// Paired writers that lifecycle commands report through.
///
/// Every line is flushed as it is written: `start` blocks for the lifetime of
/// the service, so buffered output would never reach the operator.
pub struct LifecycleOutput<W: Write, E: Write> {
    pub stdout: W,
    pub stderr: E,
}

impl<W: Write, E: Write> LifecycleOutput<W, E> {
    pub fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        write_line(&mut self.stdout, args)
    }

    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
        write_line(&mut self.stderr, args)
    }
}

fn write_line(writer: &mut impl Write, args: fmt::Arguments<'_>) -> Result<(), LifecycleError> {
    writeln!(writer, "{args}")
        .and_then(|()| writer.flush())
        .map_err(LifecycleError::Io)
}
