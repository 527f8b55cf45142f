//! Undu CLI - undu command

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;
mod util;

/// Undu - local checkpoints for your project, with instant undo
#[derive(Parser)]
#[command(name = "undu")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize undu in the current directory
    Init,
    /// Show the current checkpoint and unsaved changes
    Status,
    /// Save a named checkpoint
    Save {
        /// Checkpoint message
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Go back one or more checkpoints
    #[command(visible_alias = "back")]
    Undo {
        /// Number of checkpoints to go back
        #[arg(default_value_t = 1)]
        steps: usize,
    },
    /// Restore a checkpoint by id or message
    Goto {
        /// Checkpoint id, exact message, or part of a message
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
    },
    /// Show changes between checkpoints or against the working tree
    Diff {
        /// Starting checkpoint (default: current)
        #[arg(long)]
        from: Option<String>,
        /// Ending checkpoint (default: working tree)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show a checkpoint's files without restoring it
    Peek {
        /// Checkpoint id or message
        #[arg(required = true, num_args = 1..)]
        target: Vec<String>,
    },
    /// Show all checkpoints, newest first
    #[command(visible_alias = "history")]
    Timeline,
    /// Print a file as it was in a checkpoint
    Cat {
        /// Project-relative path
        path: String,
        /// Checkpoint id or message
        #[arg(long)]
        at: String,
    },
    /// Thin out old auto-saves and reclaim unreferenced content
    Prune {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Watch the project and auto-save after changes settle
    Watch,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so --json output stays parseable
    let filter = EnvFilter::try_from_env("UNDU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli).await {
        output::failure(&e, json);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Init => cmd::init::run(json),
        Commands::Status => cmd::status::run(json),
        Commands::Save { message } => cmd::save::run(&message.join(" "), json),
        Commands::Undo { steps } => cmd::undo::run(steps, json),
        Commands::Goto { target } => cmd::goto::run(&target.join(" "), json),
        Commands::Diff { from, to } => cmd::diff::run(from.as_deref(), to.as_deref(), json),
        Commands::Peek { target } => cmd::peek::run(&target.join(" "), json),
        Commands::Timeline => cmd::timeline::run(json),
        Commands::Cat { path, at } => cmd::cat::run(&path, &at, json),
        Commands::Prune { dry_run } => cmd::prune::run(dry_run, json),
        Commands::Watch => cmd::watch::run(json).await,
    }
}
