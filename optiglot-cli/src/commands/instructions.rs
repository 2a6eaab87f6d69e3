//! `optiglot instructions` - inspect persisted instruction files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use optiglot_core::Candidate;

#[derive(Args)]
pub struct InstructionsArgs {
    #[command(subcommand)]
    pub command: InstructionsCommands,
}

#[derive(Subcommand)]
pub enum InstructionsCommands {
    /// Show a saved instructions file
    Show {
        /// Flat JSON file mapping predictor names to instructions
        path: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

pub fn run(args: InstructionsArgs) -> Result<()> {
    match args.command {
        InstructionsCommands::Show { path, json } => show(&path, json),
    }
}

fn show(path: &Path, json: bool) -> Result<()> {
    let candidate = read_instructions(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidate)?);
        return Ok(());
    }

    if candidate.is_empty() {
        println!("No instructions in {}", path.display());
        return Ok(());
    }

    println!("{}", instructions_table(&candidate));
    Ok(())
}

fn read_instructions(path: &Path) -> Result<Candidate> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a predictor -> instructions mapping", path.display()))
}

fn instructions_table(candidate: &Candidate) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Predictor").fg(Color::Cyan),
        Cell::new("Instructions").fg(Color::Cyan),
    ]);

    for (predictor, instructions) in candidate.iter() {
        table.add_row(vec![Cell::new(predictor), Cell::new(instructions)]);
    }
    table
}
