use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "strand", version, about = "Localization workflow over source snapshots")]
pub struct Cli {
    /// Configuration file (defaults to `strand.toml` in the platform config directory)
    #[arg(short, long, global = true, env = "STRAND_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output; repeat for more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output; repeat for less
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn level(&self) -> LevelFilter {
        match (self.verbose, self.quiet) {
            (0, 0) => LevelFilter::INFO,
            (1, _) => LevelFilter::DEBUG,
            (_, 0) => LevelFilter::TRACE,
            (_, 1) => LevelFilter::WARN,
            (_, 2) => LevelFilter::ERROR,
            _ => LevelFilter::OFF,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage tracked commits
    #[command(subcommand)]
    Commit(CommitCommand),
}

#[derive(Subcommand, Debug)]
pub enum CommitCommand {
    /// Track a new commit and import its strings
    Create(CreateArgs),
    /// Walk a tracked commit again
    Import(ImportArgs),
    /// Show loading state, readiness and counters
    Status(Target),
    /// Forget outstanding workers of a stuck commit
    ClearWorkers(Target),
    /// Recompute counters and readiness
    Recalculate {
        #[command(flatten)]
        target: Target,
        /// Regenerate cached exports even if readiness did not change
        #[arg(long)]
        force: bool,
    },
    /// Exit successfully only if every key is approved in the locale
    Localized {
        #[command(flatten)]
        target: Target,
        locale: String,
    },
}

#[derive(Args, Debug)]
pub struct Target {
    /// Configured project name
    #[arg(short, long)]
    pub project: String,
    pub revision: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub target: Target,
    #[arg(short, long)]
    pub message: String,
    /// RFC 3339 timestamp
    #[arg(long)]
    pub committed_at: String,
    /// 0 (lowest) to 3
    #[arg(long)]
    pub priority: Option<i64>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Track the commit without importing its strings
    #[arg(long)]
    pub skip_import: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub target: Target,
    /// Treat found copy as this locale instead of the base locale
    #[arg(long)]
    pub locale: Option<String>,
    /// Extract in the foreground
    #[arg(long)]
    pub inline: bool,
    /// Re-extract blobs that were already extracted
    #[arg(long)]
    pub force: bool,
}
