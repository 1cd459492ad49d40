//! Line rendering
//!
//! A rendered line is `[HH:MM:SS.ffffff ]<qualifier> <message>`.

use std::fmt::{self, Write};

use chrono::{DateTime, Local, Timelike};

/// Width module names are padded or truncated to
pub const MODULE_NAME_LEN: usize = 20;

/// Pad with spaces or truncate `name` to exactly [`MODULE_NAME_LEN`] characters
pub fn pad_module_name(name: &str) -> String {
    format!("{:<width$.width$}", name, width = MODULE_NAME_LEN)
}

/// Qualifier attached to every line: `<module> L<level> -`
pub fn qualifier(module: &str, level: i32) -> String {
    format!("{} L{} -", module, level)
}

/// Timestamp prefix `HH:MM:SS.ffffff` with microsecond precision
pub fn timestamp(now: DateTime<Local>) -> String {
    // Leap seconds carry nanoseconds past 1e9; keep six digits.
    let micros = (now.nanosecond() % 1_000_000_000) / 1_000;
    format!(
        "{:02}:{:02}:{:02}.{:06}",
        now.hour(),
        now.minute(),
        now.second(),
        micros
    )
}

/// A message rendered from its format arguments
#[derive(Debug)]
pub struct RenderedMessage {
    /// The message text; partial if rendering failed
    pub text: String,
    /// Whether the message rendered completely
    pub complete: bool,
}

/// Render a message from format arguments
///
/// A `Display` implementation that reports an error stops rendering. The text
/// written up to that point is kept and `complete` is false.
pub fn render_message(message: fmt::Arguments<'_>) -> RenderedMessage {
    let mut text = String::new();
    let complete = text.write_fmt(message).is_ok();
    RenderedMessage { text, complete }
}

/// Assemble a line from an optional timestamp, the qualifier and the message
pub fn compose_line(stamp: Option<DateTime<Local>>, qualifier: &str, message: &str) -> String {
    let mut line = String::with_capacity(16 + qualifier.len() + 1 + message.len());
    if let Some(now) = stamp {
        line.push_str(&timestamp(now));
        line.push(' ');
    }
    line.push_str(qualifier);
    line.push(' ');
    line.push_str(message);
    line
}
