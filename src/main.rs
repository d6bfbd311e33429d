//! ddt-runner - data-driven test runner
//!
//! Loads records from JSON, YAML or CSV files and checks each one against an
//! expected field value, using the retry, timeout and concurrency policy of
//! the `ddt_runner` engine.
//!
//! ## Usage
//!
//! ```bash
//! # Check every record's `expected` field
//! ddt-runner run --data users.csv --field expected --equals ok
//!
//! # One record, with retries and a JUnit report
//! ddt-runner run --data users.yaml --index 2 --retries 2 --format junit --output nightly
//!
//! # Count matching records
//! ddt-runner count --data users.json --field role --equals admin
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;

mod cli;

use cli::{Args, Command, CountArgs, DataArgs, RunArgs};
use ddt_runner::config::print_env_help;
use ddt_runner::utils::logger::{init_logger, LogLevel};
use ddt_runner::{
    CaseContext, DataProvider, DataRecord, EngineConfig, EnvConfig, ExecutionOptions, FileSink,
    FileSource, ReportFormat, ReportRenderer, TestExecutor,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match args.command {
        Command::Run(run_args) => {
            let all_passed = run(run_args).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        Command::Count(count_args) => {
            count(count_args).await?;
        }
        Command::Env => {
            print_env_help();
            println!();
            EnvConfig::load().print_summary();
        }
    }

    Ok(())
}

async fn load_provider(data: &DataArgs) -> Result<DataProvider> {
    let mut provider = DataProvider::new(FileSource::new());
    provider
        .load_multiple(data.data.as_slice())
        .await
        .context("Failed to load test data")?;
    Ok(provider)
}

/// File, then environment, then command line
fn resolve_config(args: &RunArgs) -> Result<EngineConfig> {
    let env = EnvConfig::load();

    let mut config = match args.config.as_ref().or(env.config_file.as_ref()) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    }
    .with_env(&env);

    if args.concurrent {
        config.concurrent = true;
    }
    if let Some(limit) = args.max_concurrency {
        config.max_concurrency = Some(limit);
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(format) = &args.format {
        // an explicit flag must name a real format
        ReportFormat::from_str(format)?;
        config.report_format = format.clone();
    }

    Ok(config)
}

async fn run(args: RunArgs) -> Result<bool> {
    let config = resolve_config(&args)?;
    let format = config.report_format();
    let provider = load_provider(&args.data).await?;

    let mut options = ExecutionOptions::from_config(&args.name, &config);
    if let Some(index) = args.index {
        options = options.with_index(index);
    }

    info!(
        "Running {} with {} retries, {:?} timeout",
        options.name,
        options.max_retries,
        Duration::from_millis(config.timeout_ms)
    );

    let check = args
        .data
        .check()
        .map(|(field, value)| (field.to_string(), value.to_string()));

    let routine = move |record: DataRecord, index: usize, _ctx: CaseContext| {
        let outcome = match &check {
            Some((field, value)) if record.field_equals(field, value) => Ok(()),
            Some((field, value)) => Err(anyhow::anyhow!(
                "record {} has {}={}, expected {}",
                index,
                field,
                record.get(field).map(|v| v.to_string()).unwrap_or_else(|| "<missing>".into()),
                value
            )),
            None if record.is_empty() => Err(anyhow::anyhow!("record {index} is empty")),
            None => Ok(()),
        };
        async move { outcome }
    };

    let executor = TestExecutor::new();
    let summary = executor.execute(routine, &provider, options).await?;

    let history = executor.get_results();
    println!("{}", ReportRenderer::new(&history).render(format)?);

    if let Some(name) = &args.output {
        let sink = match &config.report_dir {
            Some(dir) => FileSink::new(dir),
            None => FileSink::default_dir()?,
        };
        let location = executor.save_report(format, &sink, name)?;
        println!("Report saved to {location}");
    }

    Ok(summary.is_all_passed())
}

async fn count(args: CountArgs) -> Result<()> {
    let provider = load_provider(&args.data).await?;
    let total = provider.count()?;

    match args.data.check() {
        Some((field, value)) => {
            let matching = provider.count_where(|record| record.field_equals(field, value))?;
            println!("{matching}/{total} records have {field}={value}");
        }
        None => println!("{total} records"),
    }

    Ok(())
}
