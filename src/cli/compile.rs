//! One-shot compile (no `--watch`).

use anyhow::{Result, bail};

use crate::actor::fs::check_directory;
use crate::compiler::{CommandCompiler, Compiler};
use crate::config::QtexConfig;
use crate::logger::{status_error, status_success};

/// Compile the project once. Fails when the compile fails.
pub fn compile_once(config: &QtexConfig) -> Result<()> {
    let root = check_directory(&config.root)?;
    let compiler = CommandCompiler::new(config.compile.command.clone());

    match compiler.compile(&root, &config.compile_options()) {
        Ok(artifact) => {
            status_success(&format!(
                "compiled {} in {}ms",
                config.compile.output,
                artifact.duration.as_millis()
            ));
            Ok(())
        }
        Err(e) => {
            status_error("compile failed", &e.to_string());
            bail!("compilation failed")
        }
    }
}
