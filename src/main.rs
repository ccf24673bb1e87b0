mod cli;
mod commands;
mod config;
mod engine;
mod grants;
mod paths;
mod progress;
mod resolver;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Settings;
use log::LevelFilter;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

/// `-q` wins; otherwise each `-v` raises the level from warn
fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose, cli.quiet))
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "grantctl", &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref(), &cli.overrides)?;
    log::debug!("Using grants {}", settings.grants.display());

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, settings, &args),
        Command::Apply(args) => commands::apply::run(&ctx, settings, &args),
        Command::Show(args) => commands::show::run(&settings, &args),
        Command::Completions { .. } => Ok(()),
    }
}
