//! Shared log backend
//!
//! One backend receives the lines of any number of [`Logger`](super::Logger)
//! handles. Every operation runs under a single lock, so lines reach the file in
//! the order their `log` calls acquired it and a flush never interleaves with an
//! append.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::Local;

use crate::config::Config;

use super::buffer::{LineBuffer, DEFAULT_CAPACITY};
use super::error::{LogError, LogStatus, Fault};
use super::file_writer::{
    append_lines, ensure_directory, normalize_directory, today_log_file_path, DEFAULT_LOG_DIR,
};
use super::format::{compose_line, render_message};

static GLOBAL: OnceLock<Arc<Backend>> = OnceLock::new();

/// State guarded by the backend lock
#[derive(Debug)]
struct BackendState {
    /// Resolved log directory; `None` until first use or first `set_log_directory`
    logs_dir: Option<PathBuf>,
    /// Directory adopted on first use when none was set
    default_dir: PathBuf,
    buffer: LineBuffer,
    timestamp: bool,
    fault: Fault,
}

impl BackendState {
    /// Record a fault; the first fault recorded is kept
    fn record_fault(&mut self, fault: Fault) {
        if !self.fault.is_set() {
            self.fault = fault;
        }
    }

    fn set_directory(&mut self, path: &Path) -> Result<(), LogError> {
        let dir = normalize_directory(path);
        self.logs_dir = Some(dir.clone());

        let created = if dir.as_os_str().is_empty() {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty log directory path",
            ))
        } else {
            ensure_directory(&dir)
        };

        created.map_err(|source| {
            self.record_fault(Fault::Directory);
            let err = LogError::Directory { path: dir, source };
            tracing::warn!("{}; logging disabled", err);
            err
        })
    }

    fn resolved_dir(&self) -> &Path {
        self.logs_dir.as_deref().unwrap_or(&self.default_dir)
    }

    /// Write out and clear the buffer
    ///
    /// The buffer is cleared even when the write fails.
    fn flush(&mut self) -> Result<(), LogError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let path = today_log_file_path(self.resolved_dir());
        let lines = self.buffer.drain();

        append_lines(&path, &lines).map_err(|source| {
            let err = LogError::Flush { path, source };
            tracing::warn!("{}; {} lines dropped", err, lines.len());
            err
        })
    }
}

/// Shared buffering writer behind every logger handle
#[derive(Debug)]
pub struct Backend {
    state: Mutex<BackendState>,
    /// Live `Logger` handles bound to this backend
    handles: AtomicUsize,
}

impl Backend {
    /// Create a backend with the default capacity, timestamps enabled and `/logs`
    /// as the directory adopted on first use
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a backend that flushes every `capacity` lines
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(capacity, true, PathBuf::from(DEFAULT_LOG_DIR))
    }

    /// Create a backend from configuration
    ///
    /// A configured `log_dir` replaces the default directory; it is created on
    /// first use like the default.
    pub fn from_config(config: &Config) -> Self {
        let default_dir = config
            .log_dir
            .as_deref()
            .map(normalize_directory)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
        Self::build(config.capacity, config.timestamp, default_dir)
    }

    fn build(capacity: usize, timestamp: bool, default_dir: PathBuf) -> Self {
        Self {
            state: Mutex::new(BackendState {
                logs_dir: None,
                default_dir,
                buffer: LineBuffer::new(capacity),
                timestamp,
                fault: Fault::Healthy,
            }),
            handles: AtomicUsize::new(0),
        }
    }

    /// The process-wide backend, created on first access
    pub fn global() -> Arc<Backend> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Backend::new())))
    }

    /// Install `backend` as the process-wide backend
    ///
    /// Returns false if the global backend already exists.
    pub fn install_global(backend: Arc<Backend>) -> bool {
        GLOBAL.set(backend).is_ok()
    }

    pub(crate) fn attach_handle(&self) {
        self.handles.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns true when the last handle detached
    pub(crate) fn detach_handle(&self) -> bool {
        self.handles.fetch_sub(1, Ordering::AcqRel) == 1
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render, buffer and, if the buffer filled up, flush one line
    ///
    /// A faulted backend refuses the call before the message is rendered. The
    /// message is rendered outside the lock. A message that fails to render is
    /// still buffered as far as it got, and disables the backend for every later
    /// call.
    pub fn log(&self, qualifier: &str, message: fmt::Arguments<'_>) -> Result<LogStatus, LogError> {
        let fault = self.fault();
        if fault.is_set() {
            return Err(LogError::Disabled { fault });
        }

        let message = render_message(message);

        // The fault may have been set while rendering.
        let mut state = self.lock();
        if state.fault.is_set() {
            return Err(LogError::Disabled { fault: state.fault });
        }

        if state.logs_dir.is_none() {
            let default_dir = state.default_dir.clone();
            if state.set_directory(&default_dir).is_err() {
                return Err(LogError::Disabled { fault: state.fault });
            }
        }

        let stamp = state.timestamp.then(Local::now);
        let line = compose_line(stamp, qualifier, &message.text);

        if !message.complete {
            state.record_fault(Fault::Render);
            tracing::warn!("Log message failed to render; logging disabled: {}", line);
        }

        if state.buffer.push(line) {
            state.flush()?;
        }

        Ok(LogStatus::Logged)
    }

    /// Write all buffered lines to today's log file
    pub fn flush(&self) -> Result<(), LogError> {
        self.lock().flush()
    }

    /// Set and create the log directory
    ///
    /// Trailing separators and control characters are stripped. Lines already
    /// buffered go to the new directory at the next flush. Failure disables
    /// logging for the rest of the process.
    pub fn set_log_directory(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        self.lock().set_directory(path.as_ref())
    }

    /// The configured log directory, if one has been set or adopted
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.lock().logs_dir.clone()
    }

    /// Path of today's log file in the current (or default) directory
    pub fn current_log_file_path(&self) -> PathBuf {
        today_log_file_path(self.lock().resolved_dir())
    }

    /// Toggle the timestamp prefix for lines logged from now on
    pub fn enable_timestamp(&self, enable: bool) {
        self.lock().timestamp = enable;
    }

    pub fn timestamp_enabled(&self) -> bool {
        self.lock().timestamp
    }

    /// Current fault state
    pub fn fault(&self) -> Fault {
        self.lock().fault
    }

    /// Snapshot of the lines waiting to be flushed
    pub fn pending_lines(&self) -> Vec<String> {
        self.lock().buffer.lines().to_vec()
    }

    /// Number of lines waiting to be flushed
    pub fn pending(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Number of lines that triggers an automatic flush
    pub fn capacity(&self) -> usize {
        self.lock().buffer.capacity()
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !state.buffer.is_empty() {
            tracing::debug!("Draining {} buffered log lines", state.buffer.len());
            if let Err(e) = state.flush() {
                tracing::debug!("Drain on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("partial")?;
            Err(fmt::Error)
        }
    }

    fn test_backend(temp_dir: &TempDir, capacity: usize) -> Backend {
        let backend = Backend::with_capacity(capacity);
        backend.enable_timestamp(false);
        backend.set_log_directory(temp_dir.path()).unwrap();
        backend
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_log_buffers_until_flush() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        let status = backend.log("q L1 -", format_args!("first")).unwrap();
        assert_eq!(status, LogStatus::Logged);
        backend.log("q L2 -", format_args!("second {}", 2)).unwrap();

        assert_eq!(backend.pending_lines(), vec!["q L1 - first", "q L2 - second 2"]);
        assert!(!backend.current_log_file_path().exists());

        backend.flush().unwrap();
        assert_eq!(backend.pending(), 0);
        assert_eq!(
            read_lines(&backend.current_log_file_path()),
            vec!["q L1 - first", "q L2 - second 2"]
        );
    }

    #[test]
    fn test_flush_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        backend.log("q", format_args!("once")).unwrap();
        backend.flush().unwrap();
        backend.flush().unwrap();

        assert_eq!(read_lines(&backend.current_log_file_path()), vec!["q once"]);
    }

    #[test]
    fn test_flush_empty_backend_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        backend.flush().unwrap();
        assert!(!backend.current_log_file_path().exists());
    }

    #[test]
    fn test_flush_appends_exactly_k_lines() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);
        let path = backend.current_log_file_path();

        backend.log("q", format_args!("existing")).unwrap();
        backend.flush().unwrap();
        let before = read_lines(&path).len();

        for i in 0..7 {
            backend.log("q", format_args!("line {}", i)).unwrap();
        }
        backend.flush().unwrap();

        assert_eq!(read_lines(&path).len(), before + 7);
    }

    #[test]
    fn test_full_buffer_flushes_automatically() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 4);
        let path = backend.current_log_file_path();

        for i in 0..3 {
            backend.log("q", format_args!("line {}", i)).unwrap();
        }
        assert!(!path.exists());

        backend.log("q", format_args!("line 3")).unwrap();
        assert_eq!(read_lines(&path).len(), 4);
        assert_eq!(backend.pending(), 0);

        backend.log("q", format_args!("line 4")).unwrap();
        assert_eq!(read_lines(&path).len(), 4);
        assert_eq!(backend.pending(), 1);

        backend.flush().unwrap();
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "q line 4");
    }

    #[test]
    fn test_timestamp_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        backend.enable_timestamp(true);
        assert!(backend.timestamp_enabled());
        backend.log("q L1 -", format_args!("stamped")).unwrap();
        backend.enable_timestamp(false);
        backend.log("q L1 -", format_args!("plain")).unwrap();

        let lines = backend.pending_lines();
        let (stamp, rest) = lines[0].split_at(16);
        assert_eq!(rest, "q L1 - stamped");
        assert_eq!(stamp.len(), "HH:MM:SS.ffffff ".len());
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(&stamp[8..9], ".");
        assert!(stamp.ends_with(' '));
        assert_eq!(lines[1], "q L1 - plain");
    }

    #[test]
    fn test_timestamps_enabled_by_default() {
        assert!(Backend::new().timestamp_enabled());
    }

    #[test]
    fn test_directory_normalization() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Backend::new();

        let with_slash = format!("{}/logs/", temp_dir.path().display());
        let without_slash = format!("{}/logs", temp_dir.path().display());

        backend.set_log_directory(&with_slash).unwrap();
        let first = backend.current_log_file_path();
        assert_eq!(backend.log_directory(), Some(PathBuf::from(&without_slash)));

        backend.set_log_directory(&without_slash).unwrap();
        assert_eq!(backend.current_log_file_path(), first);
        assert!(temp_dir.path().join("logs").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_directory_is_created_as_given() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let mut raw = temp_dir.path().as_os_str().as_bytes().to_vec();
        raw.extend_from_slice(b"/logs\xff/");
        let backend = Backend::new();

        backend.set_log_directory(OsStr::from_bytes(&raw)).unwrap();

        let expected = temp_dir.path().join(OsStr::from_bytes(b"logs\xff"));
        assert_eq!(backend.log_directory(), Some(expected.clone()));
        assert!(expected.is_dir());
    }

    #[test]
    fn test_redirect_applies_at_next_flush() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        backend.log("q", format_args!("moved")).unwrap();
        backend.set_log_directory(temp_dir.path().join("other")).unwrap();
        backend.flush().unwrap();

        let moved = backend.current_log_file_path();
        assert!(moved.starts_with(temp_dir.path().join("other")));
        assert_eq!(read_lines(&moved), vec!["q moved"]);
    }

    #[test]
    fn test_configured_directory_created_on_first_use() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("logs");
        let config = Config {
            log_dir: Some(dir.clone()),
            capacity: 8,
            timestamp: false,
            ..Config::default()
        };
        let backend = Backend::from_config(&config);

        assert_eq!(backend.log_directory(), None);
        assert_eq!(backend.capacity(), 8);
        assert_eq!(backend.current_log_file_path().parent(), Some(dir.as_path()));
        assert!(!dir.exists());

        backend.log("q", format_args!("hello")).unwrap();
        assert!(dir.is_dir());
        assert_eq!(backend.log_directory(), Some(dir));
    }

    #[test]
    fn test_directory_fault_is_sticky() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let backend = Backend::new();

        let err = backend.set_log_directory(blocker.join("logs")).unwrap_err();
        assert!(matches!(err, LogError::Directory { .. }));
        assert_eq!(backend.fault(), Fault::Directory);

        let err = backend.log("q", format_args!("refused")).unwrap_err();
        assert!(matches!(
            err,
            LogError::Disabled {
                fault: Fault::Directory
            }
        ));
        assert_eq!(err.code(), -2);
        assert_eq!(backend.pending(), 0);

        // A later good directory does not clear the fault
        backend.set_log_directory(temp_dir.path()).unwrap();
        assert!(backend.log("q", format_args!("still refused")).is_err());
        assert_eq!(backend.pending(), 0);
    }

    #[test]
    fn test_failed_default_directory_disables_logging() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let config = Config {
            log_dir: Some(blocker.join("logs")),
            ..Config::default()
        };
        let backend = Backend::from_config(&config);

        assert!(matches!(
            backend.log("q", format_args!("first")),
            Err(LogError::Disabled {
                fault: Fault::Directory
            })
        ));
        assert_eq!(backend.fault(), Fault::Directory);
        assert_eq!(backend.pending(), 0);
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let backend = Backend::new();
        assert!(backend.set_log_directory("").is_err());
        assert_eq!(backend.fault(), Fault::Directory);
    }

    #[test]
    fn test_render_fault_buffers_partial_line() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        let status = backend.log("q", format_args!("value {}", Broken)).unwrap();
        assert_eq!(status, LogStatus::Logged);
        assert_eq!(backend.fault(), Fault::Render);
        assert_eq!(backend.pending(), 1);
        assert!(backend.pending_lines()[0].starts_with("q value partial"));

        let err = backend.log("q", format_args!("after")).unwrap_err();
        assert!(matches!(err, LogError::Disabled { fault: Fault::Render }));
        assert_eq!(backend.pending(), 1);

        // Already buffered lines can still be written out
        backend.flush().unwrap();
        assert_eq!(read_lines(&backend.current_log_file_path()).len(), 1);
    }

    #[test]
    fn test_faulted_backend_skips_rendering() {
        struct Counted<'a>(&'a AtomicUsize);

        impl fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                f.write_str("counted")
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);
        let renders = AtomicUsize::new(0);

        backend.log("q", format_args!("{}", Counted(&renders))).unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        backend.log("q", format_args!("{}", Broken)).unwrap();
        assert!(backend.log("q", format_args!("{}", Counted(&renders))).is_err());
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flush_failure_is_reported_and_not_sticky() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);

        backend.log("q", format_args!("lost")).unwrap();
        // Make today's log file path a directory so opening it fails
        fs::create_dir(backend.current_log_file_path()).unwrap();

        let err = backend.flush().unwrap_err();
        assert!(matches!(err, LogError::Flush { .. }));
        assert_eq!(err.code(), -3);
        assert_eq!(backend.pending(), 0);
        assert_eq!(backend.fault(), Fault::Healthy);

        backend.set_log_directory(temp_dir.path().join("ok")).unwrap();
        backend.log("q", format_args!("kept")).unwrap();
        backend.flush().unwrap();
        assert_eq!(read_lines(&backend.current_log_file_path()), vec!["q kept"]);
    }

    #[test]
    fn test_auto_flush_failure_is_returned_from_log() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 1);
        fs::create_dir(backend.current_log_file_path()).unwrap();

        let err = backend.log("q", format_args!("x")).unwrap_err();
        assert!(matches!(err, LogError::Flush { .. }));
    }

    #[test]
    fn test_drop_drains_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let backend = test_backend(&temp_dir, 16);
        let path = backend.current_log_file_path();

        backend.log("q", format_args!("drained")).unwrap();
        drop(backend);

        assert_eq!(read_lines(&path), vec!["q drained"]);
    }

    #[test]
    fn test_concurrent_logging_writes_every_line_once() {
        const THREADS: usize = 8;
        const LINES: usize = 250;

        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(test_backend(&temp_dir, 16));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for i in 0..LINES {
                        backend
                            .log("q", format_args!("thread {:02} line {:04} end", t, i))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        backend.flush().unwrap();

        let lines = read_lines(&backend.current_log_file_path());
        assert_eq!(lines.len(), THREADS * LINES);

        let mut seen = std::collections::HashSet::new();
        let mut last_per_thread = vec![None; THREADS];
        for line in &lines {
            assert_eq!(line.len(), "q thread 00 line 0000 end".len());
            assert!(line.starts_with("q thread ") && line.ends_with(" end"));
            assert!(seen.insert(line.clone()), "duplicate line {}", line);

            let t: usize = line[9..11].parse().unwrap();
            let i: usize = line[17..21].parse().unwrap();
            if let Some(prev) = last_per_thread[t] {
                assert!(i > prev, "thread {} out of order", t);
            }
            last_per_thread[t] = Some(i);
        }
    }

    #[test]
    fn test_concurrent_first_use_creates_default_once() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("default");
        let config = Config {
            log_dir: Some(dir.clone()),
            timestamp: false,
            ..Config::default()
        };
        let backend = Arc::new(Backend::from_config(&config));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || backend.log("q", format_args!("race")).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.log_directory(), Some(dir.clone()));
        assert_eq!(backend.pending(), 4);
        assert_eq!(backend.fault(), Fault::Healthy);
        assert!(dir.is_dir());
    }
}
