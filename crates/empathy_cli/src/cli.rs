//! Command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "empathy", version, about = "Anonymous diary matching engine")]
pub struct Cli {
    /// TOML config file; falls back to EMPATHY_CONFIG, then defaults.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted.
    Run,
    /// Run one matching pass now.
    Match,
    /// Close expired rooms and prune expired records now.
    Cleanup,
    /// Print scheduler state and upcoming fire times.
    Status,
    /// Print today's most frequent empathy words.
    Digest,
}
