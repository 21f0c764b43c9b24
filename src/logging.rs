//! Logging configuration with journald support on Linux.
//!
//! Sets up tracing-based logging that integrates with systemd's journal on
//! Linux systems. When journald is disabled or unreachable, logs go to a
//! daily-rolling file if a directory is configured, and to stderr otherwise.

use anyhow::{Context, Result};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Keeps the non-blocking file writer alive for the whole process.
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system.
///
/// Log level can be controlled via the `PIXLY_LOG` environment variable:
/// - `PIXLY_LOG=debug` for verbose output
/// - `PIXLY_LOG=info` for standard output (default)
/// - `PIXLY_LOG=warn` for warnings and errors only
pub fn init(config: &LoggingConfig) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if config.journald {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(journald_layer)
                    .try_init()
                    .context("Failed to set tracing subscriber")?;

                tracing::info!("Logging initialized with journald backend");
                return Ok(());
            }
        }
    }

    if let Some(log_dir) = &config.directory {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let file_appender = tracing_appender::rolling::daily(log_dir, "pixly.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init()
            .context("Failed to set tracing subscriber")?;

        tracing::info!("Logging initialized with file backend at {:?}", log_dir);
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("PIXLY_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
