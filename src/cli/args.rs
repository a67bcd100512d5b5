//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Compile a LaTeX project, optionally watching it with a live browser preview
#[derive(Parser, Debug, Clone)]
#[command(name = "qtex", version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project directory containing the LaTeX sources
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub directory: PathBuf,

    /// Watch for changes, recompile and reload the preview
    #[arg(short, long)]
    pub watch: bool,

    /// Output file name, written inside the project directory (default: output.pdf)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<String>,

    /// Main source file (default: main.tex, or the first .tex file found)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub main: Option<PathBuf>,

    /// Port for the preview server in watch mode
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Don't open the preview in a browser when watching
    #[arg(long)]
    pub no_open: bool,

    /// DevTools endpoint of a browser for the agent to keep the preview tab in
    /// (e.g. http://127.0.0.1:9222)
    #[arg(long, value_name = "URL")]
    pub devtools: Option<String>,

    /// Print machine-readable JSON event lines
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, relative to the project directory
    #[arg(short = 'C', long, default_value = "qtex.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,
}
