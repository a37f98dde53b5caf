//! Logging setup
//!
//! Each process role (the control side and the render worker) builds its own
//! [`Logging`] handle. The handle owns a [`Dispatch`] and the non-blocking
//! writer guard; threads install the dispatch with [`Logging::install`] or
//! [`tracing::dispatcher::set_default`]. Nothing is registered globally.

use crate::config::LogSettings;
use crate::error::{PixelBoxError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::dispatcher::DefaultGuard;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, Layer};

/// Log file prefix of the control process
pub const MAIN_LOG: &str = "main";

/// Log file prefix of the render worker
pub const WORKER_LOG: &str = "worker";

/// Logging handle for one process role
pub struct Logging {
    dispatch: Dispatch,
    log_file: Option<PathBuf>,
    // Flushes the file writer when dropped
    _guard: Option<WorkerGuard>,
}

impl Logging {
    /// Build console and file sinks from settings
    ///
    /// The file is `<directory>/<file_prefix>.log`, truncated on start.
    /// `RUST_LOG` takes precedence over `settings.level`.
    pub fn init(settings: &LogSettings, file_prefix: &str) -> Result<Self> {
        let filter = || -> Result<EnvFilter> {
            match EnvFilter::try_from_default_env() {
                Ok(filter) => Ok(filter),
                Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
                    PixelBoxError::Logging(format!("Invalid log level [{}]: {}", settings.level, e))
                }),
            }
        };

        let console_layer = if settings.console_output {
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter()?),
            )
        } else {
            None
        };

        let (file_layer, guard, log_file) = if settings.file_output {
            std::fs::create_dir_all(&settings.directory).map_err(|e| {
                PixelBoxError::Logging(format!(
                    "Failed to create log directory {}: {}",
                    settings.directory.display(),
                    e
                ))
            })?;

            let path = settings.directory.join(format!("{file_prefix}.log"));
            let file = File::create(&path).map_err(|e| {
                PixelBoxError::Logging(format!("Failed to create log file {}: {}", path.display(), e))
            })?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(filter()?);
            (Some(layer), Some(guard), Some(path))
        } else {
            (None, None, None)
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            log_file,
            _guard: guard,
        })
    }

    /// Handle that discards every event
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
            log_file: None,
            _guard: None,
        }
    }

    /// Dispatch to hand to spawned threads
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Path of the log file, if file output is enabled
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Make this the default dispatch of the current thread
    pub fn install(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

/// Run `f` under a file-only logger and return what it wrote
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let dir = tempfile::tempdir().expect("temp log dir");
    let logging =
        Logging::init(&LogSettings::file_only(dir.path()), "captured").expect("test logging");
    let path = dir.path().join("captured.log");
    tracing::dispatcher::with_default(logging.dispatch(), f);
    drop(logging);
    std::fs::read_to_string(path).unwrap_or_default()
}
