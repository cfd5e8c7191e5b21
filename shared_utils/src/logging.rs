use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Errors that can occur while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum LoggingInitError {
    /// The log file could not be opened for appending.
    #[error("Failed to open log file: {0}")]
    LogFile(#[from] io::Error),

    /// A global subscriber was already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes tracing with a console layer and, when `log_file` is given, a
/// second plain-text layer appending to that file.
///
/// The filter defaults to `info` and honors `RUST_LOG`. Call once per process;
/// a second call fails with [`LoggingInitError::Install`].
pub fn init(log_file: Option<&Path>) -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer().with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .try_init()?;
        }
    }
    Ok(())
}
