use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LoggingSettings, default_log_path};

const LOG_ENV: &str = "XMVISIO_LOG";

/// Install the global subscriber, writing to a file since the terminal is in raw mode.
///
/// `XMVISIO_LOG` overrides the configured filter.
pub fn init(settings: &LoggingSettings) -> io::Result<PathBuf> {
    let path = settings
        .file
        .clone()
        .or_else(default_log_path)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no log directory (HOME unset)"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_names(true),
        )
        .try_init()
        .map_err(io::Error::other)?;

    Ok(path)
}
