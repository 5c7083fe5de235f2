//! Logging setup with a reloadable filter and daily rolling files.
//!
//! - Runtime log level changes via `tracing_subscriber::reload`
//! - Console output plus a daily rolling log file
//! - Log file retention cleanup
//! - Local timezone timestamps

use chrono::{Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "rust_scast=info,sqlx=warn,tower_http=info";

/// Prefix of the rolled log files (`rust-scast.log.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "rust-scast.log";

/// Default log retention period in days.
const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Timer that formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Directory for rolled log files.
    pub log_dir: PathBuf,
    /// Write the log file as JSON lines.
    pub json: bool,
    /// Days a rolled log file is kept.
    pub retention_days: i64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            json: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Handle on the installed subscriber.
pub struct LoggingHandle {
    handle: FilterHandle,
    log_dir: PathBuf,
    retention_days: i64,
}

impl LoggingHandle {
    pub fn new(handle: FilterHandle, settings: &LoggingSettings) -> Self {
        Self {
            handle,
            log_dir: settings.log_dir.clone(),
            retention_days: settings.retention_days,
        }
    }

    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Replace the filter directive (e.g. `rust_scast=debug,sqlx=warn`).
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::config(format!("Invalid filter directive: {}", e)))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Start the daily log retention cleanup task.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let log_dir = self.log_dir.clone();
        let retention_days = self.retention_days;

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60);

            loop {
                if let Err(e) = cleanup_old_logs(&log_dir, retention_days).await {
                    warn!(error = %e, "Failed to cleanup old logs");
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {}
                }
            }
        });
    }
}

/// Date encoded in a rolled log file name.
fn rolled_file_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Delete rolled log files older than `retention_days`. Returns the number deleted.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days);

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(rolled_file_date)
        else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

/// Install the global subscriber.
///
/// Returns the handle and the file writer guard; keep the guard alive for
/// the lifetime of the application.
pub fn init_logging(settings: &LoggingSettings) -> crate::Result<(Arc<LoggingHandle>, WorkerGuard)> {
    std::fs::create_dir_all(&settings.log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let initial_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    let (plain_file_layer, json_file_layer) = if settings.json {
        (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_timer(LocalTimer),
            ),
        )
    } else {
        (
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_timer(LocalTimer),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(plain_file_layer)
        .with(json_file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok((Arc::new(LoggingHandle::new(filter_handle, settings)), guard))
}
