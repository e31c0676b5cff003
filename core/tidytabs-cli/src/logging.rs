//! Logging setup: stderr plus a daily-rolling file under ~/.tidytabs/logs.
//!
//! `TIDYTABS_DEBUG_LOG=1` forces debug output; otherwise `RUST_LOG` applies,
//! falling back to `info`.

use fs_err as fs;
use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "tidytabs";

fn log_dir() -> Option<PathBuf> {
    tidytabs_core::get_tidytabs_dir().map(|dir| dir.join("logs"))
}

fn env_filter() -> EnvFilter {
    let debug_enabled = env::var("TIDYTABS_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn file_writer() -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).ok()?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&dir)
        .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole process or buffered file lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let (file_layer, guard) = match file_writer() {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    guard
}
