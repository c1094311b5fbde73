use anyhow::{Context, Result};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Console logging plus an optional plain-text log file.
///
/// INFO by default, DEBUG with `-v`, TRACE with `-vv`; `RUST_LOG`
/// overrides both. Keep the returned guard alive until exit or the file
/// loses its tail.
pub fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::error;

    // The only test in this binary that installs the global subscriber
    #[test]
    fn log_file_holds_errors_once_guard_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serialtalk.log");

        let guard = setup_logging(Some(path.clone()), &Verbosity::new(0, 0)).unwrap();
        error!("Invalid channel selection");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Logging to file"), "{}", contents);
        assert!(contents.contains("Invalid channel selection"), "{}", contents);
    }
}
