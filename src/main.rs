//! qtex - LaTeX compile loop with live PDF preview.

#![allow(dead_code)]

mod actor;
mod agent;
mod cli;
mod compiler;
mod config;
mod core;
mod logger;
mod reload;
mod utils;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::QtexConfig;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            });
        }
    };

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);
    logger::set_json(cli.json);

    let config = QtexConfig::load(&cli)?;
    debug!("config"; "{:?}", config);

    if cli.watch {
        cli::watch::watch(&config)?;
    } else {
        cli::compile::compile_once(&config)?;
    }
    Ok(ExitCode::SUCCESS)
}
