//! Log output for lobbyd.
//!
//! Everything goes to stdout. When `[logging] file` is set the same lines are
//! appended to that file too, without ANSI colours. `RUST_LOG` overrides the
//! configured level when present.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{LobbyError, Result};

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Console,
    ConsoleAndFile(PathBuf),
}

impl LogTarget {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let file = config.file.trim();
        if file.is_empty() {
            LogTarget::Console
        } else {
            LogTarget::ConsoleAndFile(PathBuf::from(file))
        }
    }
}

/// Map a configured level name to a tracing level. Unknown names mean info.
fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` if set and valid, otherwise the configured level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("").add_directive(parse_level(level).into()))
}

/// Open the log file for appending, creating parent directories as needed.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber described by `config`.
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);

    let installed = match LogTarget::from_config(config) {
        LogTarget::Console => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init(),
        LogTarget::ConsoleAndFile(path) => {
            let file = Arc::new(open_log_file(&path)?);
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stdout.and(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
        }
    };
    installed.map_err(|e| LobbyError::Config(format!("logging: {e}")))
}

/// Console-only logging, used when [`init`] fails.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(build_filter(level))
        .try_init();
}
