use anyhow::{Context, Result};

use daylog::config::Config;
use daylog::logging::{self, is_level_valid, Logger, MAX_LOG_LEVEL};
use daylog::log_at;

/// Level used by the main logger unless overridden on the command line
const ERROR: i32 = 3;

/// Level used by the worker logger
const MAJOR: i32 = 2;

fn local_function(log: &Logger, level: i32) {
    let _ = log_at!(log, 7, "local_function() called.");

    // A second handle, local to this function
    let bob = Logger::new("Bob", level);
    println!("Logging level for Bob set to {}", level);

    for entry_level in [1, 3, 5, 7] {
        let _ = log_at!(log, entry_level, "Logging level set to {}.", log.level());
        let _ = log_at!(bob, entry_level, "Logging level set to {}.", bob.level());
    }

    if let Err(e) = bob.flush() {
        tracing::warn!("Flush failed: {}", e);
    }
}

fn remote_function(worker: &mut Logger, level: i32) {
    if level != MAJOR {
        worker.set_level(level);
    }

    for entry_level in 1..MAX_LOG_LEVEL {
        let _ = log_at!(worker, entry_level, "Logging level set to {}.", worker.level());
    }
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "daylog=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    let _guard = logging::init(&config)?;

    let mut log = Logger::new(file!(), ERROR);
    let mut worker = Logger::new("worker", MAJOR);

    // Override the main logger's level from the first argument
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<i32>() {
            Ok(level) if is_level_valid(level) && level != ERROR => {
                log.set_level(level);
                println!("Logging level for {} changed to {}", file!(), level);
            }
            _ => tracing::warn!("Ignoring invalid log level {:?}", arg),
        }
    }

    let _ = log_at!(log, 7, "main() called.");

    local_function(&log, 6);
    remote_function(&mut worker, MAJOR);

    log.set_level(5);
    println!("Logging level for {} changed to 5", file!());

    local_function(&log, 4);
    remote_function(&mut worker, 7);

    log.flush().context("Failed to flush log")?;

    println!("Check results in {}", log.current_log_file_path().display());

    Ok(())
}
