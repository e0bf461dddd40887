//! Command-line argument parsing for the governor binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Request governor: admission control and usage metrics
#[derive(Parser, Debug, Clone)]
#[command(name = "request-governor", version, about)]
pub struct Args {
    /// Configuration file path (created with defaults if missing)
    #[arg(short, long, default_value = "governor.toml", env = "GOVERNOR_CONFIG")]
    pub config: PathBuf,

    /// Directory for persisted state (overrides config file)
    #[arg(short, long, env = "GOVERNOR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for governor.log; file logging is off when unset
    #[arg(long, env = "GOVERNOR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer JSON-lines requests on stdin until EOF or a shutdown signal
    Serve,
    /// Print the global summary of the persisted state
    Summary,
    /// Recompute aggregates from the persisted logs and save them
    Rebuild,
    /// Write a full snapshot of the persisted state
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Args {
    /// Subcommand to run, `serve` when none was given
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
