use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "tgr")]
#[command(about = "Deterministic multi-signal topic clustering for browser tabs and other short documents")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output (errors are still logged)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Use this config file instead of probing tabgroup.toml and friends
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cluster a corpus of documents
    Cluster(ClusterArgs),

    /// Score predictions (or a fresh clustering) against a gold scenario
    Eval(EvalArgs),

    /// Initialize a tabgroup.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ClusterFormat {
    /// Single JSON object with clusters, assignments and stats
    #[default]
    Json,
    /// Human-readable cluster listing
    Text,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum EvalFormat {
    /// Flat JSON record
    #[default]
    Json,
    /// Metrics table
    Table,
}

#[derive(Debug, Parser)]
pub struct ClusterArgs {
    /// Corpus file (JSON array of documents)
    pub corpus: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = ClusterFormat::Json)]
    pub format: ClusterFormat,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the join threshold
    #[arg(long)]
    pub join: Option<f32>,

    /// Override the split threshold
    #[arg(long)]
    pub split: Option<f32>,
}

#[derive(Debug, Parser)]
pub struct EvalArgs {
    /// Scenario file ({name, notes, tabs: [{url, gold}]})
    pub scenario: PathBuf,

    /// Predictions file (JSON object url -> cluster id)
    #[arg(long, conflicts_with = "corpus", required_unless_present = "corpus")]
    pub predictions: Option<PathBuf>,

    /// Cluster this corpus and evaluate the result
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = EvalFormat::Json)]
    pub format: EvalFormat,

    /// Also list per-cluster purity (table format only)
    #[arg(long)]
    pub purity: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; defaults to the shell's per-user completion directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
