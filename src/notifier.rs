//! User-facing error notifications.
//!
//! Stylesheet errors are shown through a [`Notifier`] instead of aborting the
//! process, so a watch session survives a typo.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::io::Write;

/// Title used for build error notifications.
pub const ERROR_TITLE: &str = "Build Error!";

/// Displays a titled message to the developer.
pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, title: &str, message: &str);
}

/// Writes a boxed message to stderr and rings the terminal bell.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    bell: bool,
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self { bell: true }
    }
}

impl TerminalNotifier {
    pub fn new(bell: bool) -> Self {
        Self { bell }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(format_block(title, message).as_bytes());
        if self.bell {
            let _ = stderr.write_all(b"\x07");
        }
        let _ = stderr.flush();
    }
}

fn format_block(title: &str, message: &str) -> String {
    let width = message.lines().map(str::len).chain(std::iter::once(title.len())).max().unwrap_or(0);
    let rule = "-".repeat(width.min(78));
    format!("{rule}\n{title}\n{rule}\n{message}\n{rule}\n")
}

/// Keeps notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far as `(title, message)` pairs.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.messages.lock().push((title.to_string(), message.to_string()));
    }
}
