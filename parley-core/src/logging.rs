//! Tracing subscriber setup

use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::LoggingConfig;

/// Prefix of the daily rolling log files (`parley.log.YYYY-MM-DD`)
const LOG_FILE_PREFIX: &str = "parley.log";

/// Days a rolled log file is kept
const LOG_RETENTION_DAYS: u64 = 7;

/// Initialize the logging system.
///
/// `RUST_LOG` and `LOG_FORMAT` take precedence over the config values.
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> crate::Result<WorkerGuard> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for (module, level) in &config.overrides {
        match format!("{}={}", module, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => eprintln!("Invalid log directive: {}={}", module, level),
        }
    }

    let format_str = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let is_json = format_str.eq_ignore_ascii_case("json");

    let file_appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Console output stays compact; the file keeps source locations.
    let stdout_layer = if is_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().compact().boxed()
    };

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("failed to install subscriber: {}", e)))?;

    if let Err(e) = cleanup_old_logs(Path::new(&config.dir), LOG_RETENTION_DAYS) {
        tracing::warn!("Failed to clean up old logs: {}", e);
    }

    Ok(guard)
}

/// Remove rolled log files older than `days` days
fn cleanup_old_logs(dir: &Path, days: u64) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let threshold = Duration::from_secs(days * 24 * 3600);
    let mut removed = 0;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_log {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > threshold) {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert_eq!(cleanup_old_logs(&missing, 7).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_keeps_fresh_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("parley.log.2026-10-16"), "fresh").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "other").unwrap();

        assert_eq!(cleanup_old_logs(temp_dir.path(), 7).unwrap(), 0);
        assert!(temp_dir.path().join("parley.log.2026-10-16").exists());
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_with_zero_retention_removes_logs_only() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("parley.log.2020-01-01"), "old").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "other").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cleanup_old_logs(temp_dir.path(), 0).unwrap(), 1);
        assert!(!temp_dir.path().join("parley.log.2020-01-01").exists());
        assert!(temp_dir.path().join("notes.txt").exists());
    }
}
