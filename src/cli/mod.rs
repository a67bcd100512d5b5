//! Command-line surface: argument definitions and the two run modes.

mod args;
pub mod compile;
pub mod watch;

pub use args::Cli;
