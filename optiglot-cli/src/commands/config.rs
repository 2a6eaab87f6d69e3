use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use optiglot_session::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show {
        /// Read only this file instead of the user and project layers
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print where configuration and session artifacts live
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show { file } => show(file),
        ConfigCommands::Path => paths(),
    }
}

fn show(file: Option<PathBuf>) -> Result<()> {
    let config = match file {
        Some(path) => ConfigLoader::load_from_path(&path)?,
        None => ConfigLoader::load()?,
    };
    print!("{}", ConfigLoader::render(&config)?);
    Ok(())
}

fn paths() -> Result<()> {
    println!("user      {}", ConfigLoader::user_config_path().display());
    println!("project   {}", ConfigLoader::project_config_path().display());
    println!("sessions  {}", optiglot_paths::sessions_dir().display());
    Ok(())
}
