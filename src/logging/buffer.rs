//! In-memory line buffer
//!
//! Holds rendered lines until they are written to the log file. The buffer is not
//! synchronised on its own; the backend keeps it behind its lock.

/// Default number of lines buffered before an automatic flush
pub const DEFAULT_CAPACITY: usize = 256;

/// Fixed-capacity buffer of rendered log lines, in insertion order
#[derive(Debug)]
pub struct LineBuffer {
    /// Buffered lines, oldest first
    lines: Vec<String>,
    /// Number of lines that fills the buffer
    capacity: usize,
}

impl LineBuffer {
    /// Create a buffer holding up to `capacity` lines (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, returning true if the buffer is now full
    pub fn push(&mut self, line: String) -> bool {
        self.lines.push(line);
        self.is_full()
    }

    /// Remove and return all buffered lines
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::replace(&mut self.lines, Vec::with_capacity(self.capacity))
    }

    /// Buffered lines, oldest first
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lines.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
