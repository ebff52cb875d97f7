//! Fire-and-forget notification sink.
//!
//! The engine reports achievement unlocks and tolerated partial failures
//! through this trait; the CLI prints them, a different front end could
//! toast them instead.

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Receives user-facing notifications.
pub trait Notifier {
    fn notify(&mut self, message: &str, severity: Severity);
}

/// Prints notifications to the terminal.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Success => println!("[ok] {message}"),
            Severity::Info => println!("[info] {message}"),
            Severity::Warning => eprintln!("[warn] {message}"),
            Severity::Error => eprintln!("[error] {message}"),
        }
    }
}
