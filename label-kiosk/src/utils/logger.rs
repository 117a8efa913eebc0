//! Logging Infrastructure
//!
//! Console logging, plus daily rotating files when a log directory is
//! configured. Rotated files older than 14 days are removed.

use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// File name prefix of rotated logs (`kiosk.YYYY-MM-DD`)
const LOG_PREFIX: &str = "kiosk";
const RETENTION_DAYS: i64 = 14;

/// Remove rotated log files older than the retention period
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<()> {
    use chrono::Local;

    let cutoff = (Local::now() - chrono::Duration::days(RETENTION_DAYS)).date_naive();

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        // Match kiosk.YYYY-MM-DD pattern
        if let Some(date_part) = name.strip_prefix(LOG_PREFIX).and_then(|d| d.strip_prefix('.'))
            && let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }

    Ok(())
}

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug"); `RUST_LOG` takes precedence
/// * `json_format` - JSON lines instead of human readable output
/// * `log_dir` - Optional directory for daily rotating log files
///
/// Must be called from within the tokio runtime when `log_dir` is set.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_PREFIX);

            // Start cleanup task
            tokio::spawn(periodic_cleanup(dir.to_path_buf()));

            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(appender));
            Some(if json_format { layer.json().boxed() } else { layer.boxed() })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Periodic cleanup task - runs every hour to clean old logs
async fn periodic_cleanup(log_dir: PathBuf) {
    use tokio::time::{Duration, sleep};

    loop {
        if let Err(e) = cleanup_old_logs(&log_dir) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }

        sleep(Duration::from_secs(3600)).await;
    }
}
