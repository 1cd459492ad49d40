//! Status codes, errors and fault states of the logging backend

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Outcome of a successful `log` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    /// The line was rendered and buffered (and flushed if the buffer filled up)
    Logged,
    /// The entry was above the handle's threshold and was dropped
    Filtered,
}

impl LogStatus {
    /// Integer status code (0 for logged, -1 for filtered)
    pub fn code(&self) -> i32 {
        match self {
            LogStatus::Logged => 0,
            LogStatus::Filtered => -1,
        }
    }
}

/// Sticky fault state of a backend
///
/// Once the backend leaves `Healthy` it never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    Healthy,
    /// The log directory could not be created
    Directory,
    /// A message failed to render
    Render,
}

impl Fault {
    pub fn is_set(&self) -> bool {
        !matches!(self, Fault::Healthy)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Healthy => write!(f, "no fault"),
            Fault::Directory => write!(f, "log directory unavailable"),
            Fault::Render => write!(f, "message rendering failed"),
        }
    }
}

/// Errors returned by backend operations
#[derive(Debug, Error)]
pub enum LogError {
    /// Logging is disabled by an earlier fault
    #[error("logging disabled: {fault}")]
    Disabled { fault: Fault },

    /// Buffered lines could not be written to the log file
    #[error("failed to write log file {}: {}", .path.display(), friendly_io_error_message(.source))]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The log directory could not be created
    #[error("failed to create log directory {}: {}", .path.display(), friendly_io_error_message(.source))]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    /// Integer status code matching the negative codes of [`LogStatus`]
    pub fn code(&self) -> i32 {
        match self {
            LogError::Disabled { .. } => -2,
            LogError::Flush { .. } => -3,
            LogError::Directory { .. } => -4,
        }
    }
}

/// Short description of an IO error for log diagnostics
pub fn friendly_io_error_message(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::StorageFull => "disk full".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        io::ErrorKind::NotFound => "file or directory not found".to_string(),
        _ => e.to_string(),
    }
}
