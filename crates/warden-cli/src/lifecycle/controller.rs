//! High-level orchestration for service lifecycle commands.
//!
//! `start` and `restart` host the greeting server in this process and block
//! until it stops; `stop` and `status` act on whichever process the PID
//! record names.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use warden_config::ServiceIdentity;
use warden_supervisor::{
    GreetingServer, HostedServer, RunExit, RunSummary, StatusReport, Supervisor, telemetry,
};

use super::console::ConsoleReporter;
use super::error::LifecycleError;
use super::types::{LifecycleCommand, LifecycleContext, LifecycleInvocation, LifecycleOutput};

/// Production lifecycle controller.
#[derive(Debug, Default)]
pub struct SystemLifecycle;

impl SystemLifecycle {
    pub fn handle<W: Write, E: Write>(
        &mut self,
        invocation: LifecycleInvocation,
        context: LifecycleContext<'_>,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        match invocation.command {
            LifecycleCommand::Start | LifecycleCommand::Restart => {
                self.run_foreground(invocation.command, context, output)
            }
            LifecycleCommand::Stop { force } => self.stop(force, context, output),
            LifecycleCommand::Status { json } => self.status(json, context, output),
        }
    }

    fn run_foreground<W: Write, E: Write>(
        &mut self,
        command: LifecycleCommand,
        context: LifecycleContext<'_>,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let identity = context.config.identity()?;
        identity.prepare()?;
        telemetry::initialise(context.config, Some(identity.log_path()))?;
        let supervisor = Supervisor::builder(identity)
            .timeouts(context.config.timeouts())
            .reporter(Arc::new(ConsoleReporter::new(io::stdout())))
            .build();
        let server: Arc<dyn HostedServer> = Arc::new(GreetingServer::from_config(context.config));
        let result = match command {
            LifecycleCommand::Restart => supervisor.restart(server),
            _ => supervisor.start(server),
        };
        let summary =
            result.map_err(|source| LifecycleError::Supervisor { command, source })?;
        finish_run(&summary, output)
    }

    fn stop<W: Write, E: Write>(
        &mut self,
        force: bool,
        context: LifecycleContext<'_>,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let identity = context.config.identity()?;
        telemetry::initialise(context.config, None)?;
        let supervisor = Supervisor::new(identity.clone(), context.config.timeouts());
        match supervisor.stop(force) {
            Ok(report) => {
                output.stdout_line(format_args!(
                    "{} stopped (pid {}, {})",
                    identity.name(),
                    report.pid,
                    report.outcome
                ))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(error) if error.is_informational() => {
                output.stdout_line(format_args!(
                    "{} is not running (no live pid in {})",
                    identity.name(),
                    identity.pid_path().display()
                ))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(source) => Err(LifecycleError::Supervisor {
                command: LifecycleCommand::Stop { force },
                source,
            }),
        }
    }

    fn status<W: Write, E: Write>(
        &mut self,
        json: bool,
        context: LifecycleContext<'_>,
        output: &mut LifecycleOutput<W, E>,
    ) -> Result<ExitCode, LifecycleError> {
        let identity = context.config.identity()?;
        telemetry::initialise(context.config, None)?;
        let supervisor = Supervisor::new(identity.clone(), context.config.timeouts());
        let report = supervisor.status();
        if json {
            write_status_json(&identity, &report, output)?;
        } else {
            write_status_lines(&identity, &report, output)?;
        }
        Ok(match report {
            StatusReport::Unknown { .. } => ExitCode::FAILURE,
            StatusReport::NotRunning | StatusReport::Running { .. } => ExitCode::SUCCESS,
        })
    }
}

fn finish_run<W: Write, E: Write>(
    summary: &RunSummary,
    output: &mut LifecycleOutput<W, E>,
) -> Result<ExitCode, LifecycleError> {
    match &summary.exit {
        Some(RunExit::Completed) => Ok(ExitCode::SUCCESS),
        Some(exit) => Err(LifecycleError::RunFailed { exit: exit.clone() }),
        None => {
            output.stderr_line(format_args!(
                "run loop for pid {} was abandoned after its shutdown budget",
                summary.pid
            ))?;
            Err(LifecycleError::ShutdownIncomplete { pid: summary.pid })
        }
    }
}

#[derive(Serialize)]
struct StatusDocument<'a> {
    service: &'a str,
    working_dir: &'a Path,
    log_file: &'a Path,
    #[serde(flatten)]
    report: &'a StatusReport,
}

fn write_status_json<W: Write, E: Write>(
    identity: &ServiceIdentity,
    report: &StatusReport,
    output: &mut LifecycleOutput<W, E>,
) -> Result<(), LifecycleError> {
    let document = StatusDocument {
        service: identity.name(),
        working_dir: identity.working_dir(),
        log_file: identity.log_path(),
        report,
    };
    let rendered = serde_json::to_string(&document).map_err(LifecycleError::Render)?;
    output.stdout_line(format_args!("{rendered}"))
}

fn write_status_lines<W: Write, E: Write>(
    identity: &ServiceIdentity,
    report: &StatusReport,
    output: &mut LifecycleOutput<W, E>,
) -> Result<(), LifecycleError> {
    output.stdout_line(format_args!("service: {}", identity.name()))?;
    match report {
        StatusReport::NotRunning => output.stdout_line(format_args!("status: not running"))?,
        StatusReport::Unknown { reason } => {
            output.stdout_line(format_args!("status: unknown"))?;
            output.stderr_line(format_args!("status check failed: {reason}"))?;
        }
        StatusReport::Running { pid, metrics } => {
            output.stdout_line(format_args!("status: running"))?;
            output.stdout_line(format_args!("pid: {pid}"))?;
            match metrics {
                Some(metrics) => {
                    output.stdout_line(format_args!("state: {}", metrics.state))?;
                    output.stdout_line(format_args!("cpu: {:.1}%", metrics.cpu_percent))?;
                    output.stdout_line(format_args!("memory: {:.2} MiB", metrics.memory_mib()))?;
                }
                None => output.stdout_line(format_args!("metrics: unavailable"))?,
            }
        }
    }
    output.stdout_line(format_args!(
        "working directory: {}",
        identity.working_dir().display()
    ))?;
    output.stdout_line(format_args!("log file: {}", identity.log_path().display()))
}
