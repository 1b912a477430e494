use thiserror::Error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::domain::model::{LogRotation, LoggingConfig};

#[derive(Debug, Error)]
pub enum BootError {
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Console plus rolling-file logging. Keep the guard alive for the life of the
/// process or buffered file lines are lost.
pub fn init_logging(cfg: &LoggingConfig) -> Result<WorkerGuard, BootError> {
    // Base level from config, still overridable via RUST_LOG.
    let level = &cfg.level;
    let default = format!("{level},postharvest={level},sqlx=warn,reqwest=warn,hyper=warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    std::fs::create_dir_all(&cfg.file_directory).map_err(|e| {
        BootError::Fatal(format!(
            "log dir {}: {e}",
            cfg.file_directory.display()
        ))
    })?;
    let appender = match cfg.rotation {
        LogRotation::Hourly => rolling::hourly(&cfg.file_directory, &cfg.file_name),
        LogRotation::Daily => rolling::daily(&cfg.file_directory, &cfg.file_name),
        LogRotation::Never => rolling::never(&cfg.file_directory, &cfg.file_name),
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true);
    let file = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer);

    Registry::default()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| BootError::Fatal(format!("logging init: {e}")))?;

    Ok(guard)
}
