//! Validate command - Parse an input file and summarize it offline

use crate::error::CliResult;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use teamsync_core::{input, DesiredState};

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// CSV file with Channel, User and Role columns
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output for validate
#[derive(Debug, Serialize)]
struct ValidateOutput {
    records: usize,
    users: usize,
    channels: Vec<ChannelSummary>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChannelSummary {
    name: String,
    members: usize,
}

/// Execute the validate command
pub fn execute(args: ValidateArgs) -> CliResult<()> {
    let records = input::load_records(&args.input)?;
    let output = summarize(records.len(), &DesiredState::from_records(&records));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Records:  {}", output.records);
    println!("Users:    {}", output.users);
    println!("Channels: {}", output.channels.len());
    for channel in &output.channels {
        println!("  - {} ({} members)", channel.name, channel.members);
    }
    if !output.warnings.is_empty() {
        println!("Warnings: {}", output.warnings.len());
        for warning in &output.warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn summarize(records: usize, desired: &DesiredState) -> ValidateOutput {
    ValidateOutput {
        records,
        users: desired.user_count(),
        channels: desired
            .channels()
            .iter()
            .map(|name| ChannelSummary {
                name: name.clone(),
                members: desired.roster(name).map_or(0, |r| r.len()),
            })
            .collect(),
        warnings: desired.warnings().to_vec(),
    }
}
