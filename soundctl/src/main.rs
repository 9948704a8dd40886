mod audio;
mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod manager;
mod matcher;
mod monitor;
mod paths;
mod player;
mod profile;
mod sound_store;
mod window;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::debug;

use crate::cli::Cli;
use crate::manager::SoundManager;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level.into(), cli.log_file.as_deref());
    debug!("Parsed arguments: {cli:?}");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let profiles_dir = match cli.profiles_dir {
        Some(dir) => dir,
        None => paths::profiles_dir()?,
    };
    let manager = SoundManager::system(&profiles_dir)?;
    commands::run(manager, cli.command).await
}
