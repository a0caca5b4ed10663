//! SheetRun CLI - Main Entry Point
//!
//! Validates and runs spreadsheet-driven UI test suites.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sheetrun_cli::commands::{self, actions, history, run, setup, validate, EXIT_FATAL};
use sheetrun_cli::output::{self, OutputFormat};

/// SheetRun - spreadsheet-driven UI test runner
#[derive(Parser)]
#[command(name = "sheetrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project configuration file
    #[arg(
        short,
        long,
        default_value = sheetrun_common::DEFAULT_CONFIG_FILE,
        env = "SHEETRUN_CONFIG",
        global = true
    )]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit log events as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the project folders, a default configuration and an example workbook
    Setup(setup::SetupArgs),

    /// Check sheets against the action catalog without running them
    Validate(validate::ValidateArgs),

    /// Validate and execute sheets
    Run(run::RunArgs),

    /// List the actions a sheet may call
    Actions(actions::ActionsArgs),

    /// Show recent runs
    History(history::HistoryArgs),

    /// Show version information
    Version,
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Setup(args) => setup::execute(args, &cli.config),
        Commands::Validate(args) => {
            validate::execute(args, commands::load_config(&cli.config)?, cli.format)
        }
        Commands::Run(args) => run::execute(args, commands::load_config(&cli.config)?, cli.format).await,
        Commands::Actions(args) => actions::execute(args, cli.format),
        Commands::History(args) => {
            history::execute(args, commands::load_config(&cli.config)?, cli.format)
        }
        Commands::Version => {
            println!("SheetRun CLI v{}", sheetrun_common::VERSION);
            Ok(commands::EXIT_OK)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}
