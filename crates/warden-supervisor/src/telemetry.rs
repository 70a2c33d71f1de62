//! Structured telemetry initialisation for the supervisor.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter, writer::MakeWriterExt};

use warden_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to open the service log file.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Events go to stderr and, when `log_file` is given, are also appended to
/// that file. Repeated calls are idempotent: only the first installs the
/// subscriber.
pub fn initialise(
    config: &Config,
    log_file: Option<&Path>,
) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config, log_file))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config, log_file: Option<&Path>) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let file = log_file.map(open_log_file).transpose()?;
    // Colour codes only belong on an interactive terminal, never in the file.
    let ansi = file.is_none() && io::stderr().is_terminal();

    let builder = |filter: EnvFilter, writer: BoxMakeWriter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
    };
    let writer = match file {
        Some(file) => BoxMakeWriter::new(io::stderr.and(Mutex::new(file))),
        None => BoxMakeWriter::new(io::stderr),
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => {
            let json_builder = builder(filter, writer).json();
            Box::new(json_builder.flatten_event(true).finish())
        }
        LogFormat::Compact => Box::new(builder(filter, writer).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn invalid_filters_are_rejected_before_installation() {
        let config = Config {
            log_filter: String::from("warden=notalevel"),
            ..Config::default()
        };
        let error = install_subscriber(&config, None).expect_err("filter should fail");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }

    #[test]
    fn log_file_is_opened_in_append_mode() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("svc.log");
        std::fs::write(&path, "earlier run\n").expect("seed log");

        let mut file = open_log_file(&path).expect("open log");
        std::io::Write::write_all(&mut file, b"next run\n").expect("append");

        let content = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(content, "earlier run\nnext run\n");
    }

    #[test]
    fn unopenable_log_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let error = open_log_file(dir.path()).expect_err("directory is not a file");
        assert!(matches!(error, TelemetryError::LogFile { .. }));
    }
}
