use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit the run summary as a single JSON line on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "chkr",
    author,
    version,
    about = "Declarative API load and validation tool",
    long_about = "chkr sends HTTP requests described in a YAML file, validates every response against its expectation (status, response time, body values) and reports per-endpoint latency, throughput and error statistics.\n\nEndpoints run one after another. An endpoint with a `concurrent` block shares its `total` requests across `users` concurrent virtual users.\n\n`${NAME}` in urls, header values and bodies is replaced with the environment variable NAME; use `--env NAME=VALUE` to add/override values.",
    after_help = "Examples:\n  chkr run api.yaml\n  chkr run api.yaml --output json --out report.json\n  chkr run api.yaml --env BASE_URL=http://localhost:8080\n  chkr check api.yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every endpoint in a config file
    Run(RunArgs),

    /// Load and validate a config file without sending requests
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the endpoints YAML file
    pub config: PathBuf,

    /// Add/override env vars used for `${NAME}` substitution (repeatable, KEY=VALUE)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the endpoints YAML file
    pub config: PathBuf,

    /// Add/override env vars used for `${NAME}` substitution (repeatable, KEY=VALUE)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Also write the JSON summary to this file
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Only log warnings and errors (RUST_LOG still wins)
    #[arg(long, short)]
    pub quiet: bool,
}
