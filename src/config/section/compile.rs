//! `[compile]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [compile]
//! output = "output.pdf"          # Artifact name inside the project directory
//! main = "thesis.tex"            # Main source (default: main.tex or first .tex)
//! command = ["latexmk", "-pdf", "-interaction=nonstopmode", "-jobname={jobname}", "{main}"]
//! ```
//!
//! Command placeholders: `{main}`, `{jobname}` (output stem), `{output}`, `{dir}`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default engine invocation.
pub const DEFAULT_COMMAND: &[&str] = &[
    "latexmk",
    "-pdf",
    "-interaction=nonstopmode",
    "-halt-on-error",
    "-jobname={jobname}",
    "{main}",
];

/// Compile settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Artifact file name, written inside the project directory.
    pub output: String,

    /// Main source file, relative to the project directory.
    pub main: Option<PathBuf>,

    /// Engine command template.
    pub command: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            output: "output.pdf".into(),
            main: None,
            command: DEFAULT_COMMAND.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}
