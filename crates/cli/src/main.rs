//! sbtest CLI - Main Entry Point
//!
//! Generates versioned fixtures from templates, runs them against
//! deployed sandboxes and offers direct access to the individual
//! verification commands and conditions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{check, run};

/// sbtest - versioned fixtures for database sandboxes
#[derive(Parser)]
#[command(name = "sbtest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "sbtest.toml", env = "SBTEST_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate fixtures, run them and clean up
    Run(run::RunArgs),

    /// Generate fixtures only and keep them for inspection
    Generate(run::GenerateArgs),

    /// Run one verification command against a sandbox
    Check(check::CheckArgs),

    /// Evaluate one condition string
    Condition(check::ConditionArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute_run(args, &cli.config, cli.format).await,
        Commands::Generate(args) => run::execute_generate(args, &cli.config, cli.format).await,
        Commands::Check(args) => check::execute_check(args),
        Commands::Condition(args) => check::execute_condition(args, cli.format),
        Commands::Version => {
            println!("sbtest v{}", sbtest_common::VERSION);
            Ok(true)
        }
    };

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
