//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// labkit: deterministic content hashing and small lab utilities
#[derive(Parser, Debug)]
#[command(name = "labkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Content-hash text, a file or a JSON document
    Hash(HashArgs),

    /// Parse a compact duration such as 2h13m
    Duration(DurationArgs),

    /// Time an external command
    Bench(BenchArgs),

    /// Report the in-memory size of JSON documents
    Size(SizeArgs),

    /// Record arguments, environment and git state of a run
    About(AboutArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct HashArgs {
    /// Text to hash
    #[arg(long, conflicts_with_all = ["file", "json_file"])]
    pub text: Option<String>,

    /// File whose bytes are hashed (use - for stdin)
    #[arg(long, conflicts_with = "json_file")]
    pub file: Option<PathBuf>,

    /// JSON document hashed as a value tree (use - for stdin)
    #[arg(long)]
    pub json_file: Option<PathBuf>,

    /// Number of hex characters to print (at most 128)
    #[arg(long)]
    pub length: Option<usize>,

    /// Write the raw 64-byte digest instead of hex
    #[arg(long, conflicts_with = "json")]
    pub raw: bool,

    /// Prefix container digests with a kind byte
    #[arg(long)]
    pub tagged: bool,

    /// Fail on values without a defined encoding
    #[arg(long)]
    pub strict: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DurationArgs {
    /// Duration expression, e.g. 1d2h, 90m, 1.5s
    pub expr: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Runs per repeat (auto-ranged when omitted)
    #[arg(long)]
    pub number: Option<u64>,

    /// Number of timed repeats
    #[arg(long)]
    pub repeat: Option<usize>,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Command to run, after --
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// JSON documents to measure
    #[arg(required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AboutArgs {
    /// Directory whose git state is recorded
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Extra KEY=VALUE field; VALUE is parsed as JSON when possible
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Positional arguments recorded as-is
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./labkit.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}
