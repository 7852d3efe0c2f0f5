//! Logging initialization.
//!
//! `RUST_LOG` wins when set; otherwise the `-v` count picks the level.
//! Logs go to stderr so stdout only carries the operator report. A log file,
//! when configured, receives the same events without ANSI styling.

use crate::arp_modules::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub verbosity: u8,
    /// Appended to, never truncated
    pub log_file: Option<PathBuf>,
    /// ANSI styling on the stderr output
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            verbosity: 0,
            log_file: None,
            color: true,
        }
    }
}

pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Opens for append, creating missing parent directories first.
fn open_log_file(path: &Path) -> Result<File> {
    let log_file_error = |source| Error::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(log_file_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_file_error)
}

/// Stderr layer plus an optional plain-text file layer behind one filter.
pub fn build_subscriber(
    config: &LogConfig,
    env_filter: EnvFilter,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file_layer = match &config.log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false)
                .with_target(false),
        ),
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.color)
                .with_target(false),
        )
        .with(file_layer))
}

pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level_for_verbosity(config.verbosity))
    };

    let subscriber = build_subscriber(config, env_filter)?;
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
