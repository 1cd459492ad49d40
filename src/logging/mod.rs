//! Buffered logging to one file per day
//!
//! Provides the shared [`Backend`] that buffers and writes log lines, and the
//! [`Logger`] handles application code logs through.

mod backend;
mod buffer;
mod error;
mod file_writer;
mod format;
mod handle;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;

pub use backend::Backend;
pub use buffer::{LineBuffer, DEFAULT_CAPACITY};
pub use error::{friendly_io_error_message, Fault, LogError, LogStatus};
pub use file_writer::{log_file_name, log_file_path_for, normalize_directory, DEFAULT_LOG_DIR};
pub use format::{pad_module_name, MODULE_NAME_LEN};
pub use handle::{is_level_valid, Logger, DEFAULT_LOG_LEVEL, MAX_LOG_LEVEL};

/// Guard that drains the process-wide backend when dropped
///
/// Keep it alive in `main` for the duration of logging.
#[must_use = "dropping the guard flushes the log immediately"]
pub struct LoggingGuard {
    backend: Arc<Backend>,
}

impl LoggingGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Err(e) = self.backend.flush() {
            tracing::warn!("Final log flush failed: {}", e);
        }
    }
}

/// Initialize the process-wide backend from configuration
///
/// Must run before any logger uses the global backend. A configured `log_dir` is
/// created right away so an unusable directory is reported here.
pub fn init(config: &Config) -> Result<LoggingGuard> {
    config.validate()?;

    let backend = Arc::new(Backend::from_config(config));
    if !Backend::install_global(Arc::clone(&backend)) {
        anyhow::bail!("Logging backend already initialized");
    }

    if let Some(dir) = &config.log_dir {
        backend
            .set_log_directory(dir)
            .context("Failed to set up log directory")?;
    }

    tracing::debug!(
        "Logging to {} (capacity {})",
        backend.current_log_file_path().display(),
        backend.capacity()
    );

    Ok(LoggingGuard { backend })
}
