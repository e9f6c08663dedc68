use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::DateFilter;
use crate::sort::SortKey;
use crate::storage::ViewMode;
use crate::task::{Priority, Status};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: personal task tracker",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Alternate config file.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Alternate data directory.
    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task.
    Add {
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, value_enum)]
        priority: Option<Priority>,

        #[arg(long, value_enum)]
        status: Option<Status>,

        /// Due date expression (today, +3d, friday, 2026-04-01, ...).
        #[arg(long)]
        due: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        assignee: Option<String>,

        /// Estimated hours of work.
        #[arg(long)]
        estimate: Option<f64>,
    },

    /// List tasks, filtered and sorted.
    List {
        /// Case-insensitive substring over title, description, tags.
        #[arg(long)]
        search: Option<String>,

        #[arg(long = "priority", value_enum)]
        priorities: Vec<Priority>,

        #[arg(long = "status", value_enum)]
        statuses: Vec<Status>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Date bucket: all, today, week, or overdue.
        #[arg(long, value_enum)]
        due: Option<DateFilter>,

        /// Sort key: due, priority, or created.
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
    },

    /// Show one task in full.
    Info { id: String },

    /// Merge-patch a task; omitted flags leave fields alone.
    Modify {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum)]
        priority: Option<Priority>,

        #[arg(long, value_enum)]
        status: Option<Status>,

        #[arg(long, conflicts_with = "no_due")]
        due: Option<String>,

        /// Remove the due date.
        #[arg(long)]
        no_due: bool,

        /// Replace the tag set.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Remove every tag.
        #[arg(long, conflicts_with = "tags")]
        no_tags: bool,

        #[arg(long)]
        assignee: Option<String>,

        /// Remove the assignee.
        #[arg(long, conflicts_with = "assignee")]
        no_assignee: bool,

        #[arg(long)]
        estimate: Option<f64>,

        /// Remove the estimate.
        #[arg(long, conflicts_with = "estimate")]
        no_estimate: bool,
    },

    /// Mark a task completed.
    Done { id: String },

    /// Remove a task permanently.
    Delete { id: String },

    /// Aggregate statistics over the full collection.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Every tag in use, sorted.
    Tags,

    /// Write the collection as a bare JSON array.
    Export {
        /// Destination file; defaults to taskflow-export-<date>.json.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print to stdout instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Replace the collection from a JSON array file ("-" for stdin).
    Import { path: String },

    /// Delete every task and the stored collection.
    Clear,

    /// Show or set the preferred view mode.
    View {
        #[arg(value_enum)]
        mode: Option<ViewMode>,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
