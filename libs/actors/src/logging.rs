//! Process logger
//!
//! Installs a `tracing` subscriber whose output goes through a background
//! writer task. The returned [`Logger`] owns the writer guard; dropping it
//! flushes buffered lines.

use crate::{ActorError, Result};
use flow_config::{LogConfig, LogFormat};
use std::fs::OpenOptions;
use tracing::debug;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

pub struct Logger {
    _guard: WorkerGuard,
    installed: bool,
}

impl Logger {
    /// Install the global subscriber described by `config`.
    ///
    /// `RUST_LOG`, when set, takes precedence over `config.level`. If another
    /// subscriber is already installed it is left in place.
    pub fn install(config: &LogConfig) -> Result<Self> {
        let (writer, guard, ansi) = open_writer(&config.output)?;

        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
                ActorError::construction("logger", format!("invalid log level '{}': {e}", config.level))
            })?,
        };

        let result = match config.format {
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(ansi)
                .with_writer(writer)
                .try_init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(writer)
                .try_init(),
        };

        let installed = result.is_ok();
        if !installed {
            debug!("global subscriber already installed, keeping it");
        }

        Ok(Self {
            _guard: guard,
            installed,
        })
    }

    /// Whether this logger's subscriber is the active one
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

fn open_writer(output: &str) -> Result<(NonBlocking, WorkerGuard, bool)> {
    match output {
        "stderr" | "STDERR" => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            Ok((writer, guard, true))
        }
        "stdout" | "STDOUT" => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            Ok((writer, guard, true))
        }
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ActorError::io("logger", e))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            Ok((writer, guard, false))
        }
    }
}
