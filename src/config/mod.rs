//! Project configuration for `qtex.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── compile    # [compile]
//! │   ├── serve      # [serve]
//! │   └── agent      # [agent]
//! ├── error          # ConfigError
//! └── mod.rs         # QtexConfig (this file)
//! ```
//!
//! The file is optional. When present it lives in the project directory
//! (or wherever `--config` points); CLI flags override its values.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{AgentConfig, CompileConfig, ServeConfig};

use crate::{cli::Cli, compiler::CompileOptions, log};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing qtex.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QtexConfig {
    /// Project directory being compiled and watched (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Compile settings
    #[serde(default)]
    pub compile: CompileConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Browser agent settings
    #[serde(default)]
    pub agent: AgentConfig,
}

impl QtexConfig {
    /// Load configuration for the directory named on the command line.
    ///
    /// A missing config file yields defaults. CLI flags are applied last.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = std::path::absolute(&cli.directory)
            .map_err(|err| ConfigError::Io(cli.directory.clone(), err))?;
        let config_path = if cli.config.is_absolute() {
            cli.config.clone()
        } else {
            root.join(&cli.config)
        };

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.root = root;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Apply command-line overrides.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.compile.output.clone_from(output);
        }
        if let Some(main) = &cli.main {
            self.compile.main = Some(main.clone());
        }
        if let Some(port) = cli.port {
            self.serve.port = port;
        }
        if cli.no_open {
            self.serve.open = false;
        }
        if let Some(devtools) = &cli.devtools {
            self.agent.devtools = Some(devtools.clone());
        }
    }

    /// Validate values that serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let output = Path::new(&self.compile.output);
        let is_bare_name = output.file_name().is_some_and(|n| n == output.as_os_str());
        if self.compile.output.is_empty() || !is_bare_name {
            return Err(ConfigError::Validation(format!(
                "compile.output must be a plain file name, got `{}`",
                self.compile.output
            )));
        }
        if let Some(devtools) = &self.agent.devtools
            && self.agent.endpoint().is_none()
        {
            return Err(ConfigError::Validation(format!(
                "agent.devtools must be an http:// or ws:// URL, got `{devtools}`"
            )));
        }
        if self.compile.command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "compile.command must name a program".into(),
            ));
        }
        Ok(())
    }

    /// Options handed to the compiler for each job.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            output: self.compile.output.clone(),
            main: self.compile.main.clone(),
        }
    }

    /// Absolute path of the compiled artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(&self.compile.output)
    }

    /// URL of the artifact endpoint for a bound port.
    ///
    /// The browser opener and the agent both use this, so the tab one
    /// opens is the tab the other finds.
    pub fn view_url(&self, port: u16) -> String {
        if self.serve.interface.is_unspecified() {
            return format!("http://localhost:{port}/view");
        }
        let addr = std::net::SocketAddr::new(self.serve.interface, port);
        format!("http://{addr}/view")
    }
}

/// Parse config text and fail on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> QtexConfig {
    let (parsed, ignored) = QtexConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
