//! Logging infrastructure for socialscope
//!
//! Logs are written to `~/.local/state/socialscope/socialscope.YYYY-MM-DD.log`
//! following XDG standards, one file per UTC day.

use crate::config::{Config, LoggingConfig};
use crate::error::Error;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory
/// - Daily rotation, keeping `max_files` files
/// - Configurable log level via config or RUST_LOG env var
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();

    std::fs::create_dir_all(&log_dir)?;

    let (non_blocking, guard) =
        tracing_appender::non_blocking(file_appender(&log_dir, config.max_files)?);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Daily rotating `socialscope.YYYY-MM-DD.log` files in `log_dir`.
fn file_appender(log_dir: &Path, max_files: usize) -> crate::error::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("socialscope")
        .filename_suffix("log")
        .max_log_files(max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    #[test]
    fn test_file_appender_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = file_appender(dir.path(), 0).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "files: {names:?}");

        let date = names[0]
            .strip_prefix("socialscope.")
            .and_then(|rest| rest.strip_suffix(".log"))
            .unwrap_or_else(|| panic!("unexpected log file name {}", names[0]));
        assert!(NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok());

        let written = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(written, "hello\n");
    }
}
