//! Command-line interface for the two scheduled jobs.

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Collect regional news hourly and email digests on a schedule.
///
/// ```sh
/// news-digest collect
/// news-digest digest --dry-run --at 2025-10-02T07:00:00-03:00
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Settings file (TOML or JSON). Defaults to $NEWS_DIGEST_CONFIG or config/news_digest.toml
    #[arg(short, long, env = "NEWS_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch articles for every configured region and append new ones to the dataset.
    Collect {
        /// Pretend the run happens at this instant (RFC 3339).
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Send the digest for the schedule slot matching the trigger time.
    Digest {
        /// Trigger instant (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
        /// Print the message to stdout instead of sending it.
        #[arg(long)]
        dry_run: bool,
    },
}
