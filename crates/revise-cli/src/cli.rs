use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "revise",
    about = "Review changes between JSON snapshots, record by record",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Action {
    Accept,
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Placement {
    Original,
    End,
}

#[derive(Subcommand)]
pub enum Command {
    /// Annotate the changes from one snapshot to the next
    Diff(DiffArgs),
    /// Diff two snapshots, then accept or reject the changes under a path
    Resolve(ResolveArgs),
    /// Run a scripted session of snapshots, resolutions and undo/redo
    Replay(ReplayArgs),
}

/// Options shared by every command that diffs two files.
#[derive(Args)]
pub struct SnapshotArgs {
    /// Baseline snapshot (JSON file)
    pub old: PathBuf,
    /// New snapshot (JSON file)
    pub new: PathBuf,
    /// Field identifying records
    #[arg(long)]
    pub id_field: Option<String>,
    /// Path inside each record where markers are written
    #[arg(long)]
    pub scope: Option<String>,
    /// Where removed records are placed
    #[arg(long)]
    pub removed_at: Option<Placement>,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub snapshots: SnapshotArgs,
    /// Only print the added/changed/removed counts
    #[arg(long)]
    pub stat: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub snapshots: SnapshotArgs,
    #[arg(short, long)]
    pub action: Action,
    /// Path of the subtree to resolve; everything when omitted
    #[arg(short, long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Session script (JSON file)
    pub script: PathBuf,
}
