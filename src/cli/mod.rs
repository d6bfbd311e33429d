//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Data-driven test runner
#[derive(Parser, Debug)]
#[command(name = "ddt-runner")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run a check once per record of JSON, YAML or CSV test data")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check every record (or one) against an expected field value
    Run(RunArgs),

    /// Count loaded records, optionally those matching a field value
    Count(CountArgs),

    /// Show the environment variables the runner reads
    Env,
}

/// Data files and the field check shared by `run` and `count`
#[derive(ClapArgs, Debug, Clone)]
pub struct DataArgs {
    /// Data files to load (.json, .yaml, .yml, .csv); concatenated in order
    #[arg(short, long = "data", required = true, num_args = 1..)]
    pub data: Vec<String>,

    /// Field to compare
    #[arg(long, requires = "equals")]
    pub field: Option<String>,

    /// Value the field must equal
    #[arg(long, requires = "field")]
    pub equals: Option<String>,
}

impl DataArgs {
    pub fn check(&self) -> Option<(&str, &str)> {
        match (&self.field, &self.equals) {
            (Some(field), Some(value)) => Some((field.as_str(), value.as_str())),
            _ => None,
        }
    }
}

/// Arguments for run command
#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Run name shown in reports
    #[arg(short, long, default_value = "data-driven test")]
    pub name: String,

    /// Run only the record at this index
    #[arg(short, long)]
    pub index: Option<usize>,

    /// Run records concurrently
    #[arg(short, long)]
    pub concurrent: bool,

    /// Cap on concurrently running records
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Retries after a failed attempt
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Report format (table, json, json-pretty, csv, markdown, junit)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save the report under this name in the report directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Configuration file (.yaml, .yml or .json)
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for count command
#[derive(ClapArgs, Debug)]
pub struct CountArgs {
    #[command(flatten)]
    pub data: DataArgs,
}
