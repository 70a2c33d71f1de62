use super::*;

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;
use warden_config::Config;

use crate::lifecycle::LifecycleCommand;

struct StaticConfigLoader {
    config: Config,
    seen: RefCell<Vec<OsString>>,
}

impl StaticConfigLoader {
    fn new(config: Config) -> Self {
        Self {
            config,
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        self.seen.replace(args.to_vec());
        Ok(self.config.clone())
    }
}

struct Workspace {
    dir: TempDir,
    loader: StaticConfigLoader,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Workspace {
    fn run(&mut self, command: &str) -> ExitCode {
        self.stdout.clear();
        self.stderr.clear();
        super::run_with_loader(
            build_args(command),
            &mut self.stdout,
            &mut self.stderr,
            &self.loader,
        )
    }

    fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

fn build_args(command: &str) -> Vec<OsString> {
    std::iter::once("warden")
        .chain(command.split_whitespace())
        .map(OsString::from)
        .collect()
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    let config = Config {
        name: String::from("svc"),
        working_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    Workspace {
        dir,
        loader: StaticConfigLoader::new(config),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

#[rstest]
fn status_reports_not_running_without_a_record(mut workspace: Workspace) {
    let exit = workspace.run("status");
    assert_eq!(exit, ExitCode::SUCCESS);
    let stdout = workspace.stdout();
    assert!(stdout.contains("service: svc"), "stdout: {stdout}");
    assert!(stdout.contains("status: not running"), "stdout: {stdout}");
}

#[rstest]
fn stop_without_a_record_is_informational(mut workspace: Workspace) {
    let exit = workspace.run("stop");
    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(workspace.stdout().contains("svc is not running"));
    assert!(!workspace.dir.path().join("svc.pid").exists());
}

#[rstest]
fn status_removes_a_stale_record(mut workspace: Workspace) {
    let pid_path = workspace.dir.path().join("svc.pid");
    fs::write(&pid_path, "999999999\n").expect("write stale record");
    let exit = workspace.run("status --json");
    assert_eq!(exit, ExitCode::SUCCESS);
    let value: serde_json::Value =
        serde_json::from_str(workspace.stdout().trim()).expect("status json");
    assert_eq!(value["status"], "not_running");
    assert!(!pid_path.exists(), "stale record should be removed");
}

#[rstest]
#[case::missing_subcommand("")]
#[case::unknown_subcommand("launch")]
#[case::unknown_flag("stop --gently")]
fn usage_errors_fail_without_loading_configuration(
    mut workspace: Workspace,
    #[case] command: &str,
) {
    let exit = workspace.run(command);
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(!workspace.stderr().is_empty());
    assert!(workspace.loader.seen.borrow().is_empty());
}

#[rstest]
fn help_is_written_to_stdout(mut workspace: Workspace) {
    let exit = workspace.run("--help");
    assert_eq!(exit, ExitCode::SUCCESS);
    assert!(workspace.stdout().contains("Usage"));
}

#[rstest]
#[case::stop("stop", LifecycleCommand::Stop { force: false })]
#[case::forced_stop("stop --force", LifecycleCommand::Stop { force: true })]
#[case::status_json("status --json", LifecycleCommand::Status { json: true })]
#[case::restart("restart", LifecycleCommand::Restart)]
fn subcommands_map_to_lifecycle_commands(
    mut workspace: Workspace,
    #[case] command: &str,
    #[case] expected: LifecycleCommand,
) {
    let mut received = None;
    let exit = run_with_handler(
        build_args(&format!("--name svc --port=9000 {command}")),
        &mut workspace.stdout,
        &mut workspace.stderr,
        &workspace.loader,
        |invocation, _, _| {
            received = Some(invocation.command);
            Ok(ExitCode::SUCCESS)
        },
    );
    assert_eq!(exit, ExitCode::SUCCESS);
    assert_eq!(received, Some(expected));
    assert_eq!(
        *workspace.loader.seen.borrow(),
        build_args("--name svc --port=9000")
    );
}

#[rstest]
fn lifecycle_errors_are_reported_on_stderr(mut workspace: Workspace) {
    let exit = run_with_handler(
        build_args("start"),
        &mut workspace.stdout,
        &mut workspace.stderr,
        &workspace.loader,
        |_, _, _| Err(LifecycleError::ShutdownIncomplete { pid: 12 }),
    );
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(workspace.stderr().contains("pid 12 outlived its shutdown budget"));
}
