use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::parsers::parse_span;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Distributed benchmark controller - resolves declarative scenarios, drives remote agents through job lifecycles, and aggregates cross-agent measurements."
)]
pub struct ControllerArgs {
    /// Configuration file or URL (repeatable)
    #[arg(long = "config", short = 'c')]
    pub config: Vec<String>,

    /// Scenario to run
    #[arg(long)]
    pub scenario: Option<String>,

    /// Job to run without a scenario (repeatable)
    #[arg(long = "job")]
    pub jobs: Vec<String>,

    /// Profile to apply to the configuration (repeatable)
    #[arg(long = "profile")]
    pub profiles: Vec<String>,

    /// File to write the result document to
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Template variable in key=value form; integer values are typed
    /// (repeatable)
    #[arg(long = "variable")]
    pub variables: Vec<String>,

    /// Property attached to the results in key=value form (repeatable)
    #[arg(long = "property")]
    pub properties: Vec<String>,

    /// Session identifier (default: a fresh random identifier)
    #[arg(long)]
    pub session: Option<String>,

    /// Description stored with the results
    #[arg(long)]
    pub description: Option<String>,

    /// Number of iterations per pass
    #[arg(long, default_value_t = 1, conflicts_with = "span")]
    pub iterations: u32,

    /// Repeat the benchmark for this long (HH:mm:ss)
    #[arg(long, value_parser = parse_span)]
    pub span: Option<Duration>,

    /// Jobs before this one stay running across span passes
    #[arg(long = "repeat")]
    pub repeat: Option<String>,

    /// Stream measurements and cut a result document at each delimiter
    #[arg(long = "auto-flush")]
    pub auto_flush: bool,

    /// Exclude raw measurements from the result document
    #[arg(long = "no-measurements")]
    pub no_measurements: bool,

    /// Exclude measurement metadata from the result document
    #[arg(long = "no-metadata")]
    pub no_metadata: bool,

    /// SQLite database to record results into; an environment variable name
    /// is replaced by its content
    #[arg(long)]
    pub sql: Option<String>,

    /// Database table name
    #[arg(long, default_value = "Benchmarks")]
    pub table: String,

    /// Result file to compare the run against (repeatable)
    #[arg(long = "compare")]
    pub compare: Vec<String>,

    /// Verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
