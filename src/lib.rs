//! daylog - lightweight in-process logging
//!
//! Named [`Logger`] handles filter entries by severity and funnel them into a
//! shared, buffered [`Backend`] that appends them to one log file per day.

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::{Backend, Fault, LogError, LogStatus, Logger, LoggingGuard};
