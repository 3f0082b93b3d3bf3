use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log file prefix inside the log directory; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "opcli.log";

/// Build the filter: `RUST_LOG` wins over the configured level.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Route all tracing output to a daily-rolling file under `log_dir`.
///
/// The console stays reserved for the operator dialogue. Keep the returned
/// guard alive until exit so buffered records are flushed.
pub fn init(log_dir: &Path, default_level: &str) -> anyhow::Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(env_filter(default_level)),
        )
        .try_init()?;

    Ok(guard)
}
