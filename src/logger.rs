//! Terminal logging with colored module prefixes.
//!
//! - `log!` / `debug!` for one-line messages, `[module] text`
//! - `WatchStatus` for the rebuild status block that overwrites itself
//!
//! ```ignore
//! log!("build"; "{} documents", count);
//! status_error("rebuild failed", &format!("{err:#}"));
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Set by `--verbose`
static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored module prefix
///
/// ```ignore
/// log!("serve"; "[{}] {}", status, path);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, but only with `--verbose`; arguments are not evaluated otherwise
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Print `[module] message`, clearing any partial line first.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" | "reload" => prefix.bright_blue().bold().to_string(),
        "watch" | "config" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_magenta().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Success,
    Warning,
    Error,
}

impl StatusKind {
    fn symbol(self) -> String {
        match self {
            Self::Success => "✓".green().to_string(),
            Self::Warning => "⚠".yellow().to_string(),
            Self::Error => "✗".red().to_string(),
        }
    }
}

/// The latest build outcome, shown as one block that replaces the previous one.
///
/// ```ignore
/// let mut status = WatchStatus::new();
/// status.success("12 documents, 31 files in 40ms");
/// status.error("build failed, keeping previous output", "quire.toml: expected `=`");
/// ```
pub struct WatchStatus {
    /// Height of the block printed last, erased before the next one
    last_lines: usize,
}

static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    pub fn success(&mut self, message: &str) {
        self.display(StatusKind::Success, message);
    }

    pub fn warning(&mut self, message: &str) {
        self.display(StatusKind::Warning, message);
    }

    /// `detail` goes on the lines below `summary`; it may be empty.
    pub fn error(&mut self, summary: &str, detail: &str) {
        if detail.is_empty() {
            self.display(StatusKind::Error, summary);
        } else {
            self.display(StatusKind::Error, &format!("{summary}\n{detail}"));
        }
    }

    fn display(&mut self, kind: StatusKind, message: &str) {
        let mut stdout = stdout().lock();

        if let Ok(lines) = u16::try_from(self.last_lines)
            && lines > 0
        {
            execute!(stdout, cursor::MoveUp(lines), Clear(ClearType::FromCursorDown)).ok();
        }

        let timestamp = format!("[{}]", now()).dimmed().to_string();
        writeln!(stdout, "{timestamp} {} {message}", kind.symbol()).ok();
        stdout.flush().ok();

        self.last_lines = message.lines().count().max(1);
    }
}

/// Current UTC time as HH:MM:SS
fn now() -> String {
    let t = crate::utils::date::DateTimeUtc::now();
    format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second)
}

pub fn status_success(message: &str) {
    WATCH_STATUS.lock().success(message);
}

pub fn status_warning(message: &str) {
    WATCH_STATUS.lock().warning(message);
}

pub fn status_error(summary: &str, detail: &str) {
    WATCH_STATUS.lock().error(summary, detail);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_counts_detail_lines() {
        let mut status = WatchStatus::new();
        assert_eq!(status.last_lines, 0);

        status.error("rebuild failed", "quire.toml\nexpected `=`");
        assert_eq!(status.last_lines, 3);

        status.error("rebuild failed", "");
        assert_eq!(status.last_lines, 1);

        status.success("rebuilt 3 documents");
        assert_eq!(status.last_lines, 1);
    }

    #[test]
    fn test_now_format() {
        let t = now();
        assert_eq!(t.len(), 8);
        assert_eq!(t.matches(':').count(), 2);
    }

    #[test]
    fn test_prefix_keeps_module_name() {
        assert!(colorize_prefix("serve").contains("[serve]"));
        assert!(colorize_prefix("Build").contains("[Build]"));
    }
}
