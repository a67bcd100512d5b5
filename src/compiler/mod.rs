//! Document compilation.
//!
//! The watch loop treats the engine as an opaque function: a project
//! directory and [`CompileOptions`] go in, an [`Artifact`] or a
//! [`CompileError`] comes out. [`CommandCompiler`] is the shipped adapter,
//! driving a local TeX toolchain through a command template.

mod command;
mod diagnostics;
mod sources;

pub use command::CommandCompiler;
pub use diagnostics::summarize;
pub use sources::find_main;

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Options for a single compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Artifact file name, written inside the project directory.
    pub output: String,
    /// Explicit main source, relative to the project directory.
    pub main: Option<PathBuf>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            output: "output.pdf".into(),
            main: None,
        }
    }
}

impl CompileOptions {
    /// Output file name without its extension (the TeX job name).
    pub fn jobname(&self) -> &str {
        Path::new(&self.output)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }
}

/// A successfully written artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub duration: Duration,
}

/// Compile failures. All are recoverable in watch mode.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no .tex sources found in `{0}`")]
    NoSources(PathBuf),

    #[error("main file `{0}` does not exist")]
    MainNotFound(PathBuf),

    #[error("`{0}` not found in PATH")]
    EngineNotFound(String),

    #[error("{0}")]
    Failed(String),

    #[error("compile finished but `{0}` was not written")]
    MissingArtifact(PathBuf),

    #[error("failed to run compiler: {0}")]
    Io(String),
}

/// Anything that can turn a project directory into an artifact.
///
/// Implementations are called from a blocking thread and may take seconds.
pub trait Compiler: Send + Sync + 'static {
    fn compile(&self, dir: &Path, options: &CompileOptions) -> Result<Artifact, CompileError>;
}
