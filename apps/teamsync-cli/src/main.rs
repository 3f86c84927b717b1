//! teamsync - reconcile a Microsoft Teams team against a CSV roster
//!
//! Commands:
//! - `reconcile`: ensure channels exist and bring team and private channel
//!   membership in line with the input file
//! - `validate`: parse the input file and summarize the desired state
//!   without contacting Microsoft Graph

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod logging;

use error::CliResult;

/// teamsync - Teams membership reconciliation
#[derive(Parser)]
#[command(name = "teamsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging for the reconciler and Graph client
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one team against an input file
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Check an input file without contacting the directory
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_json);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Reconcile(args) => commands::reconcile::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
