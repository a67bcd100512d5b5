//! TeX engine adapter driven by a command template.

use std::path::Path;
use std::time::Instant;

use super::{Artifact, CompileError, CompileOptions, Compiler, diagnostics, sources};
use crate::config::section::DEFAULT_COMMAND;
use crate::debug;
use crate::utils::{
    exec::{Cmd, combined_output},
    path::{display_slash, relative_to},
};

/// Runs an external engine (latexmk by default) inside the project directory.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    template: Vec<String>,
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND.iter().map(|s| (*s).to_string()).collect())
    }
}

impl CommandCompiler {
    pub fn new(template: Vec<String>) -> Self {
        Self { template }
    }

    /// Substitute `{main}`, `{jobname}`, `{output}` and `{dir}` in the template.
    pub fn expand(&self, dir: &Path, main: &Path, options: &CompileOptions) -> Vec<String> {
        let main = display_slash(&relative_to(dir, main));
        let dir = display_slash(dir);
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{main}", &main)
                    .replace("{jobname}", options.jobname())
                    .replace("{output}", &options.output)
                    .replace("{dir}", &dir)
            })
            .collect()
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, dir: &Path, options: &CompileOptions) -> Result<Artifact, CompileError> {
        let started = Instant::now();
        let main = sources::find_main(dir, options.main.as_deref())?;
        let argv = self.expand(dir, &main, options);

        let program = argv.first().cloned().unwrap_or_default();
        which::which(&program).map_err(|_| CompileError::EngineNotFound(program.clone()))?;

        debug!("compile"; "running {}", argv.join(" "));
        let output = Cmd::from_slice(&argv)
            .cwd(dir)
            .output()
            .map_err(|e| CompileError::Io(format!("{e:#}")))?;

        if !output.status.success() {
            let detail = diagnostics::summarize(&combined_output(&output));
            let message = if detail.is_empty() {
                format!("`{program}` exited with {}", output.status)
            } else {
                detail
            };
            return Err(CompileError::Failed(message));
        }

        let path = dir.join(&options.output);
        if !path.is_file() {
            return Err(CompileError::MissingArtifact(path));
        }

        Ok(Artifact {
            path,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.tex"), "\\documentclass{article}").unwrap();
        dir
    }

    fn sh(script: &str) -> CommandCompiler {
        CommandCompiler::new(vec!["sh".into(), "-c".into(), script.into()])
    }

    #[test]
    fn test_expand_default_template() {
        let dir = project();
        let compiler = CommandCompiler::default();
        let options = CompileOptions {
            output: "paper.pdf".into(),
            main: None,
        };
        let argv = compiler.expand(dir.path(), &dir.path().join("sub/main.tex"), &options);

        assert_eq!(argv[0], "latexmk");
        assert!(argv.contains(&"-jobname=paper".to_string()));
        assert_eq!(argv.last().unwrap(), "sub/main.tex");
    }

    #[test]
    fn test_engine_not_found() {
        let dir = project();
        let compiler = CommandCompiler::new(vec!["qtex-no-such-engine".into(), "{main}".into()]);
        let err = compiler
            .compile(dir.path(), &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::EngineNotFound(p) if p == "qtex-no-such-engine"));
    }

    #[test]
    fn test_no_sources_before_engine() {
        let dir = TempDir::new().unwrap();
        let err = CommandCompiler::default()
            .compile(dir.path(), &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::NoSources(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_writes_artifact() {
        let dir = project();
        let compiler = sh("echo pdf-bytes > {output}");
        let artifact = compiler
            .compile(dir.path(), &CompileOptions::default())
            .unwrap();

        assert_eq!(artifact.path, dir.path().join("output.pdf"));
        assert_eq!(fs::read(&artifact.path).unwrap(), b"pdf-bytes\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reports_tex_errors() {
        let dir = project();
        let compiler = sh("echo '! Undefined control sequence.'; echo 'l.3 \\foo'; exit 1");
        let err = compiler
            .compile(dir.path(), &CompileOptions::default())
            .unwrap_err();

        match err {
            CompileError::Failed(msg) => {
                assert!(msg.contains("! Undefined control sequence."));
                assert!(msg.contains("l.3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_artifact() {
        let dir = project();
        let err = sh("true")
            .compile(dir.path(), &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingArtifact(_)));
    }
}
