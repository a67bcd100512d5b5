//! Logging utilities with colored output and watch-mode status display.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, only printed with `--verbose`
//! - `WatchStatus` for the single-block status shown while watching
//! - JSON event lines (`--json`) for editor and script integration
//!
//! # Example
//!
//! ```ignore
//! log!("watch"; "watching {}", dir.display());
//! debug!("ws"; "broadcast to {} clients", count);
//!
//! status_success("compiled output.pdf in 812ms");
//! status_error("compile failed", "! Undefined control sequence.");
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Global JSON flag (set by --json CLI argument)
static JSON: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Switch status output to JSON event lines
pub fn set_json(v: bool) {
    JSON.store(v, Ordering::SeqCst);
}

/// Check if JSON event output is enabled
pub fn is_json() -> bool {
    JSON.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
///
/// In JSON mode plain log lines go to stderr so stdout stays machine-readable.
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    if is_json() {
        eprintln!("{prefix} {message}");
        return;
    }

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

/// Print one JSON event line to stdout.
pub fn event(value: Value) {
    let mut stdout = stdout().lock();
    writeln!(stdout, "{value}").ok();
    stdout.flush().ok();
}

// ============================================================================
// Watch Status (single-line status with overwrite)
// ============================================================================

/// Get current UTC time formatted as HH:MM:SS
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Single-block status display for watch mode
///
/// Each message overwrites the previous block, keeping the terminal clean
/// across many recompiles. Errors keep the `✗` marker so they stand out.
///
/// # Example
///
/// ```ignore
/// let mut status = WatchStatus::new();
/// status.change("chapters/intro.tex");
/// status.success("compiled output.pdf in 812ms");
/// status.error("compile failed", "! Undefined control sequence.");
/// ```
pub struct WatchStatus {
    /// Lines of previous output to clear
    last_lines: usize,
}

/// Global watch status display shared by the watch-mode actors.
static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    /// Create a new watch status display.
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Display change notice (↻ prefix, blue).
    pub fn change(&mut self, file: &str) {
        self.display(
            format!("{}", "↻".blue()),
            &format!("change detected in {file}, recompiling..."),
        );
    }

    /// Display success message (✓ prefix, green).
    pub fn success(&mut self, message: &str) {
        self.display(format!("{}", "✓".green()), message);
    }

    /// Display error message (✗ prefix, red) with optional detail.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display(format!("{}", "✗".red()), &message);
    }

    /// Display warning message (⚠ prefix, yellow) with detail.
    pub fn warning(&mut self, detail: &str) {
        self.display(format!("{}", "⚠".yellow()), detail);
    }

    /// Internal display logic with line overwriting.
    fn display(&mut self, symbol: String, message: &str) {
        let mut stdout = stdout().lock();

        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
            execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
        }

        let timestamp = format!("[{}]", now()).dimmed().to_string();
        let line = format!("{timestamp} {symbol} {message}");

        writeln!(stdout, "{line}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(message);
    }
}

/// Number of terminal lines a status message occupies.
fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

/// Global watch status: change detected
pub fn status_change(file: &str) {
    if is_json() {
        event(json!({ "event": "change", "file": file }));
        return;
    }
    WATCH_STATUS.lock().change(file);
}

/// Global watch status: compile succeeded
pub fn status_success(message: &str) {
    if is_json() {
        event(json!({ "event": "compile", "success": true }));
        return;
    }
    WATCH_STATUS.lock().success(message);
}

/// Global watch status: compile failed
pub fn status_error(summary: &str, detail: &str) {
    if is_json() {
        event(json!({ "event": "compile", "success": false, "error": detail }));
        return;
    }
    WATCH_STATUS.lock().error(summary, detail);
}

/// Global watch status: runtime problem outside a compile (watcher, server)
pub fn status_warning(detail: &str) {
    if is_json() {
        event(json!({ "event": "error", "message": detail }));
        return;
    }
    WATCH_STATUS.lock().warning(detail);
}

// ============================================================================
// Tests
// ============================================================================
