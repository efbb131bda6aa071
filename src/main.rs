mod cli;
mod commands;
mod io;
mod logging;
mod organizer;
mod outside;
mod result;
mod settings;
mod subtitles;
mod types;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::{debug, warn};

use crate::{
    cli::{Cli, Commands},
    logging::{effective_level, init_logging},
    settings::{ConfigStore, Settings},
};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::new(ConfigStore::default_path()?),
    };
    // A broken configuration can still be reset or replaced
    let (settings, load_error) = match (store.load(), &cli.command) {
        (Ok(settings), _) => (settings, None),
        (Err(err), Commands::Config(_)) => (Settings::default(), Some(err)),
        (Err(err), _) => return Err(err),
    };

    let level = effective_level(settings.logging.level.into(), cli.verbose);
    let log_file = (!settings.logging.console_output).then_some(settings.logging.log_file.as_path());
    init_logging(level, log_file)?;
    match load_error {
        Some(err) => warn!("Using the default configuration: {err:?}"),
        None => debug!("Configuration loaded from {}", store.path().display()),
    }

    match &cli.command {
        Commands::Download(args) => commands::download::run(args, &settings),
        Commands::Metadata(args) => commands::metadata::run(args, &settings),
        Commands::Organize(args) => commands::organize::run(args, &settings),
        Commands::Report(args) => commands::report::run(args),
        Commands::Merge(args) => commands::merge::run(args, &settings),
        Commands::Config(command) => commands::config::run(command, &store, &settings),
    }
}
