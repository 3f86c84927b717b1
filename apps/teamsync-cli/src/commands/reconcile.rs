//! Reconcile command - Bring one team in line with an input file

use crate::config::AppConfig;
use crate::error::CliResult;
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use teamsync_connector_graph::GraphDirectory;
use teamsync_core::{input, ReconcileMode, Reconciler};

/// Which stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Channels, team membership and private channel membership
    Full,
    /// Only create missing channels
    ChannelsOnly,
}

impl From<ModeArg> for ReconcileMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => ReconcileMode::Full,
            ModeArg::ChannelsOnly => ReconcileMode::ChannelsOnly,
        }
    }
}

/// Arguments for the reconcile command
#[derive(Args)]
pub struct ReconcileArgs {
    /// Display name of the team
    #[arg(short, long)]
    pub team: String,

    /// CSV file with Channel, User and Role columns
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    pub mode: ModeArg,

    /// Compute and report changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Configuration file (default: ./teamsync.yaml if present)
    #[arg(short, long, env = crate::config::CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

/// Execute the reconcile command
pub async fn execute(args: ReconcileArgs) -> CliResult<()> {
    // Bad input should fail before any credentials are needed.
    let records = input::load_records(&args.input)?;

    let config = AppConfig::load(args.config.as_deref())?;
    let credentials = config.credentials()?;
    let directory = Arc::new(GraphDirectory::new(config.graph.clone(), credentials)?);
    let reconciler = Reconciler::new(Arc::clone(&directory), config.pacing.clone())?;
    let options = config.reconcile_options(args.mode.into(), args.dry_run);

    tracing::info!(
        team = %args.team,
        input = %args.input.display(),
        records = records.len(),
        mode = %options.mode,
        dry_run = options.dry_run,
        "Starting reconciliation"
    );

    let report = reconciler
        .reconcile_team(&args.team, &records, &options)
        .await?;

    let metrics = directory.client().rate_limit_metrics().await;
    tracing::info!(
        requests = metrics.total_requests,
        throttled = metrics.rate_limited_count,
        retries = metrics.retry_count,
        transient_retries = metrics.transient_retries,
        avg_retry_delay_ms = metrics.average_retry_delay_ms(),
        "Graph request summary"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(())
}
