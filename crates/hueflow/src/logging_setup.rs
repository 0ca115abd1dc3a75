//! tracing subscriber for the binary
//!
//! Console logs go to stderr because stdout carries the final report. The
//! optional file layer writes one file per process under `log_dir`.

use anyhow::{Context, Result};
use hueflow_core::logging::{LogConfig, LOG_FILE_PREFIX};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Non-blocking writer for `<log_dir>/hueflow-<pid>.log`
pub fn file_writer(config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;
    match config.cleanup_old_logs() {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {} old log files", removed),
        Err(e) => eprintln!("Warning: Failed to cleanup old log files: {}", e),
    }

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(format!("{}-{}", LOG_FILE_PREFIX, std::process::id()))
        .filename_suffix("log")
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log file in {:?}", config.log_dir))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let console = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(true)
            .with_filter(env_filter(config))
    });

    let (file, guard) = if config.file_output {
        let (writer, guard) = file_writer(config)?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_filter(env_filter(config));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging at level {}", config.level);
    if config.file_output {
        tracing::info!("Log file: {:?}", config.current_log_path());
    }
    Ok(guard)
}
