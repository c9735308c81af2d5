//! Tracing subscriber setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// File name prefix of the daily log files (`polyview.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "polyview.log";

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_level`. With
/// `log_dir` set, output goes to a daily rolling file through a non-blocking
/// writer whose guard must be held for the life of the process; otherwise it
/// goes to stderr. Returns `None` when a subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>, default_level: &str) -> Option<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_dir.is_none())
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(LoggingGuard { _worker: guard })
}

/// Keeps the background log writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}
