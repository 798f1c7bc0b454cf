use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use etfcache::core::log::{LogStyle, init_logging};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for etfcache::AppCommand {
    fn from(cmd: Commands) -> etfcache::AppCommand {
        match cmd {
            Commands::Refresh => etfcache::AppCommand::Refresh,
            Commands::Show { ticker, refresh } => etfcache::AppCommand::Show { ticker, refresh },
            Commands::List => etfcache::AppCommand::List,
            Commands::Serve { bind } => etfcache::AppCommand::Serve { bind },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Refresh every tracked ticker from the providers
    Refresh,
    /// Display the cached series for one ticker
    Show {
        /// Fund code, e.g. 510300
        ticker: String,
        /// Force a refresh before reading
        #[arg(short, long)]
        refresh: bool,
    },
    /// List cached tickers
    List,
    /// Serve the JSON API
    Serve {
        /// Address to listen on, overriding the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let style = match cli.command {
        Some(Commands::Serve { .. }) => LogStyle::Server,
        _ => LogStyle::Cli,
    };
    init_logging(cli.verbose, style);

    let result = match cli.command {
        Some(Commands::Setup) => etfcache::cli::setup::setup(),
        Some(cmd) => etfcache::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
