mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::bands::{AddBandArgs, DeleteBandArgs, EditBandArgs};
use commands::definition::{ApplicabilityArgs, ValidateArgs};
use commands::resolve::{ChargeArgs, ResolveArgs};

/// Loan fee definitions: validation, band schedules and fee resolution
#[derive(Parser)]
#[command(
    name = "lfee",
    version,
    about = "Validate, resolve and charge loan fee definitions",
    long_about = "A CLI for working with loan fee definitions with decimal precision. \
                  Validates definitions, derives form field applicability, edits \
                  value and period band schedules, resolves fees for a loan amount \
                  or term, and computes the resulting charge."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log core decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a fee definition draft and list every problem
    Validate(ValidateArgs),
    /// Show which fields apply to a combination of selections
    Applicability(ApplicabilityArgs),
    /// Resolve the fee value for a loan amount or term
    Resolve(ResolveArgs),
    /// Compute the fee charged on a loan
    Charge(ChargeArgs),
    /// Append a band to a draft's schedule
    AddBand(AddBandArgs),
    /// Replace a band in a draft's schedule
    EditBand(EditBandArgs),
    /// Remove a band from a draft's schedule
    DeleteBand(DeleteBandArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let engine_config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Validate(args) => commands::definition::run_validate(args, &engine_config),
        Commands::Applicability(args) => {
            commands::definition::run_applicability(args, &engine_config)
        }
        Commands::Resolve(args) => commands::resolve::run_resolve(args),
        Commands::Charge(args) => commands::resolve::run_charge(args, &engine_config),
        Commands::AddBand(args) => commands::bands::run_add_band(args, &engine_config),
        Commands::EditBand(args) => commands::bands::run_edit_band(args, &engine_config),
        Commands::DeleteBand(args) => commands::bands::run_delete_band(args),
        Commands::Version => {
            println!("lfee {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
