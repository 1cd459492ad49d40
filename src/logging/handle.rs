//! Logger handles
//!
//! A [`Logger`] binds a module name and a severity threshold to a shared
//! [`Backend`]. Lower levels are more important; entries above the threshold
//! are dropped before they reach the backend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::backend::Backend;
use super::error::{LogError, LogStatus};
use super::format::{pad_module_name, qualifier};

/// Highest supported log level
pub const MAX_LOG_LEVEL: i32 = 9;

/// Threshold used when none is given
pub const DEFAULT_LOG_LEVEL: i32 = 6;

/// Check that `level` lies in `0..=MAX_LOG_LEVEL`
pub fn is_level_valid(level: i32) -> bool {
    (0..=MAX_LOG_LEVEL).contains(&level)
}

/// Named logging handle with its own threshold
///
/// Handles are cheap to clone. Directory, timestamp and flush operations act on
/// the shared backend and so affect every handle bound to it. Dropping the last
/// handle on a backend flushes it, which drains the process-wide backend at exit
/// when no [`LoggingGuard`](super::LoggingGuard) is held.
#[derive(Debug)]
pub struct Logger {
    backend: Arc<Backend>,
    /// Module name, padded or truncated to `MODULE_NAME_LEN`
    module: String,
    level: i32,
}

impl Logger {
    /// Create a handle on the process-wide backend
    pub fn new(module: &str, level: i32) -> Self {
        Self::with_backend(Backend::global(), module, level)
    }

    /// Create a handle on the process-wide backend with the default threshold
    pub fn named(module: &str) -> Self {
        Self::new(module, DEFAULT_LOG_LEVEL)
    }

    /// Create a handle on a specific backend
    pub fn with_backend(backend: Arc<Backend>, module: &str, level: i32) -> Self {
        backend.attach_handle();
        Self {
            backend,
            module: pad_module_name(module),
            level,
        }
    }

    /// Log a message at `level` if it passes the threshold
    ///
    /// Prefer the [`log_at!`](crate::log_at) macro, which builds the arguments.
    pub fn logf(&self, level: i32, message: fmt::Arguments<'_>) -> Result<LogStatus, LogError> {
        if level > self.level {
            return Ok(LogStatus::Filtered);
        }

        self.backend.log(&qualifier(&self.module, level), message)
    }

    /// The padded module name
    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Change the threshold; the value is not range checked
    pub fn set_level(&mut self, level: i32) {
        self.level = level;
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn flush(&self) -> Result<(), LogError> {
        self.backend.flush()
    }

    pub fn set_log_directory(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        self.backend.set_log_directory(path)
    }

    pub fn log_directory(&self) -> Option<PathBuf> {
        self.backend.log_directory()
    }

    pub fn current_log_file_path(&self) -> PathBuf {
        self.backend.current_log_file_path()
    }

    pub fn enable_timestamp(&self, enable: bool) {
        self.backend.enable_timestamp(enable);
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        self.backend.attach_handle();
        Self {
            backend: Arc::clone(&self.backend),
            module: self.module.clone(),
            level: self.level,
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.backend.detach_handle() {
            if let Err(e) = self.backend.flush() {
                tracing::debug!("Flush on last handle drop failed: {}", e);
            }
        }
    }
}

/// Log a formatted message through a [`Logger`]
///
/// ```no_run
/// use daylog::{log_at, Logger};
///
/// let logger = Logger::new("startup", 3);
/// let _ = log_at!(logger, 1, "listening on port {}", 8080);
/// ```
#[macro_export]
macro_rules! log_at {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.logf($level, format_args!($($arg)+))
    };
}
