use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ferry",
    about = "Idempotent, integrity-checked object replication",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file (defaults to ./ferry.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy one object from the source store to the destination bucket
    Replicate(ReplicateArgs),
    /// Load and validate the configuration
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
pub struct ReplicateArgs {
    /// Source bucket
    pub bucket: String,
    /// Object key, kept unchanged at the destination
    pub key: String,
    #[arg(long)]
    pub source_root: Option<PathBuf>,
    #[arg(long)]
    pub dest_root: Option<PathBuf>,
    #[arg(long)]
    pub dest_bucket: Option<String>,
}

#[derive(Args)]
pub struct CheckConfigArgs {}
