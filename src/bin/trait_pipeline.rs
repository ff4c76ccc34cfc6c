//! trait-pipeline command line.
//!
//! Loads a trait corpus, runs the requested stages, validates everything and
//! commits the artifacts in one batch.
//!
//! # Exit codes
//!
//! - `0`: artifacts written
//! - `1`: validation failed, nothing written
//! - `2`: configuration, shape or I/O error, nothing written
//!
//! # Usage
//!
//! ```bash
//! trait-pipeline --source data/personality/trait_definitions_fixed.json \
//!     --out-dir data run
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use trait_pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOptions, PipelineReport, RunMode};

#[derive(Parser)]
#[command(name = "trait-pipeline")]
#[command(about = "Migrate a trait corpus into the hybrid runtime model", long_about = None)]
#[command(version)]
struct Cli {
    /// Source trait corpus (JSON array); never modified
    #[arg(long, env = "TRAIT_PIPELINE_SOURCE", global = true,
          default_value = "data/personality/trait_definitions_fixed.json")]
    source: PathBuf,

    /// Directory artifacts are written under
    #[arg(long, env = "TRAIT_PIPELINE_OUT_DIR", global = true, default_value = "data")]
    out_dir: PathBuf,

    /// YAML overrides merged over the built-in tables
    #[arg(short, long, env = "TRAIT_PIPELINE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Existing key table to check runtime keys against (repeatable)
    #[arg(long = "key-table", global = true)]
    key_tables: Vec<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Write the derived violation-stress artifact only
    Derive,
    /// Write the hybrid model, cross-reference maps and locale tables
    Migrate,
    /// Derive and migrate in one commit
    Run,
}

impl From<Command> for RunMode {
    fn from(command: Command) -> Self {
        match command {
            Command::Derive => RunMode::Derive,
            Command::Migrate => RunMode::Migrate,
            Command::Run => RunMode::Run,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,trait_pipeline=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn execute(cli: &Cli) -> anyhow::Result<PipelineReport> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("loading config overrides from {}", path.display()))?,
        None => PipelineConfig::builtin().context("loading built-in tables")?,
    };
    let options = PipelineOptions {
        source: cli.source.clone(),
        out_dir: cli.out_dir.clone(),
        key_tables: cli.key_tables.clone(),
    };
    let report = Pipeline::new(&config, options).run(cli.command.into())?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::Validation(report)) => {
                println!("[FAIL] Migration validation failed:");
                println!("{}", report);
                ExitCode::from(1)
            }
            _ => {
                eprintln!("error: {:#}", err);
                ExitCode::from(2)
            }
        },
    }
}
