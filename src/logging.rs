//! Tracing subscriber setup: console output plus an optional error log file.

use std::io;
use std::path::{Path, PathBuf};

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// File inside the log directory that receives ERROR records.
pub const ERROR_LOG_FILE: &str = "errors.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Debug level unless `RUST_LOG` is set.
    pub verbose: bool,
    /// Directory for [`ERROR_LOG_FILE`]; console only when `None`.
    pub log_dir: Option<PathBuf>,
}

/// Keeps the file writer thread alive; hold it for the life of the process.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> LogGuard {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut layers: Vec<BoxedLayer> = vec![tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(filter)
        .boxed()];

    let mut file_guard = None;
    let mut file_error = None;
    if let Some(dir) = &config.log_dir {
        match error_file_layer(dir) {
            Ok((layer, guard)) => {
                layers.push(layer);
                file_guard = Some(guard);
            }
            Err(e) => file_error = Some(e),
        }
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();

    if let (Some(dir), Some(e)) = (&config.log_dir, file_error) {
        tracing::warn!("Error log disabled: cannot create {}: {e}", dir.display());
    }

    LogGuard {
        _file_guard: file_guard,
    }
}

/// Layer writing ERROR records, without ANSI colours, to `dir/errors.log`.
fn error_file_layer(dir: &Path) -> io::Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::NEVER, dir, ERROR_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(LevelFilter::ERROR)
        .boxed();

    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_file_receives_only_errors() {
        let dir = std::env::temp_dir().join(format!("gemini-relay-logs-{}", uuid::Uuid::new_v4()));
        let (layer, guard) = error_file_layer(&dir).unwrap();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("routine startup message");
            tracing::warn!("recoverable problem");
            tracing::error!("secret lookup failed");
        });
        // Flushes the background writer.
        drop(guard);

        let contents = std::fs::read_to_string(dir.join(ERROR_LOG_FILE)).unwrap();
        assert!(contents.contains("secret lookup failed"));
        assert!(!contents.contains("routine startup message"));
        assert!(!contents.contains("recoverable problem"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
