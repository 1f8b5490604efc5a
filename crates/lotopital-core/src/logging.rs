//! Tracing subscriber setup.
//!
//! `LOTOPITAL_LOG` takes an `EnvFilter` directive (e.g. `lotopital_core=debug`)
//! and wins over the configured `log_level`. Logs go to stderr unless a log
//! file is configured.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "LOTOPITAL_LOG";

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
///
/// # Errors
/// Returns an error if the filter is invalid or the log file cannot be opened.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive.trim())
            .with_context(|| format!("Invalid {LOG_ENV} filter: {directive}"))?,
        _ => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log_level in config: {}", config.log_level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let Some(log_file) = config.log_file.as_deref() else {
        // A subscriber may already be installed (tests, embedding apps).
        let _ = builder.with_writer(std::io::stderr).try_init();
        return Ok(None);
    };

    let path = Path::new(log_file);
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log_file has no file name: {log_file}"))?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = builder.with_ansi(false).with_writer(writer).try_init();
    Ok(Some(guard))
}
