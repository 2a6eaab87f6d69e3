use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use optiglot_observe::{LogConfig, LogFormat};

mod commands;

#[derive(Parser)]
#[command(name = "optiglot", about = "Host-side tools for instruction optimization")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Inspect persisted instructions
    Instructions(commands::instructions::InstructionsArgs),
    /// Reference optimizer: evaluate the seed candidate and finalize with it
    Baseline(commands::baseline::BaselineArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format.into());
    optiglot_observe::init_tracing(&log_config)?;

    match cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Instructions(args) => commands::instructions::run(args),
        Commands::Baseline(args) => commands::baseline::run(args).await,
    }
}
