//! External command execution utilities.
//!
//! Provides a Builder-based API for running the TeX engine and the platform
//! browser opener.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Inspect output regardless of exit status
//! let output = Cmd::from_slice(&["latexmk", "-pdf", "main.tex"]).cwd(dir).output()?;
//!
//! // Fail on non-zero exit
//! Cmd::new("xdg-open").arg(url).run()?;
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    sync::OnceLock,
};

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["latexmk", "-pdf", "main.tex"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Program name for error messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Execute and capture output without interpreting the exit status.
    ///
    /// Stdin is closed so an engine waiting for terminal input fails fast
    /// instead of hanging the compile loop.
    pub fn output(self) -> Result<Output> {
        let name = self.program_name();
        let mut cmd = self.command();
        cmd.stdin(Stdio::null());
        cmd.output()
            .with_context(|| format!("Failed to execute `{name}`"))
    }

    /// Execute the command, failing on non-zero exit.
    pub fn run(self) -> Result<Output> {
        let name = self.program_name();
        let output = self.output()?;
        if !output.status.success() {
            anyhow::bail!(format_error(&name, &output));
        }
        Ok(output)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

// ============================================================================
// Browser opener
// ============================================================================

/// Platform command that opens a URL in the default browser.
pub fn opener_command(url: &str) -> Cmd {
    if cfg!(target_os = "macos") {
        Cmd::new("open").arg(url)
    } else if cfg!(target_os = "windows") {
        // `start` treats the first quoted argument as a window title
        Cmd::from_slice(&["cmd", "/C", "start", ""]).arg(url)
    } else {
        Cmd::new("xdg-open").arg(url)
    }
}

/// Open `url` in the default browser.
pub fn open_in_browser(url: &str) -> Result<()> {
    opener_command(url).run().map(|_| ())
}

// ============================================================================
// Helpers
// ============================================================================

/// Strip ANSI escape codes from string.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Stdout and stderr of a finished process, joined and ANSI-stripped.
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let joined = match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
        (false, true) => stdout.trim_end().to_string(),
        (true, _) => stderr.trim_end().to_string(),
    };
    strip_ansi(&joined).into_owned()
}

/// Format error message for failed command.
fn format_error(name: &str, output: &Output) -> String {
    let mut msg = format!("Command `{name}` failed with {}", output.status);
    let detail = combined_output(output);
    if !detail.is_empty() {
        msg.push('\n');
        msg.push_str(&detail);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================
