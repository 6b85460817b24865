//! WARDEN permission engine demo CLI
//!
//! Builds permission expressions from a TOML dictionary and prints their
//! traces before and after evaluation.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- any-field
//!   cargo run -p demo -- specific-field
//!   cargo run -p demo -- share
//!   cargo run -p demo -- library --policy demo/policies/library.toml
//!   cargo run -p demo -- --plain run-all

mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warden_contracts::error::WardenResult;
use warden_core::TraceStyle;
use warden_policy::EntityDictionary;

use crate::scenarios::Options;

/// Library dictionary compiled into the binary; `--policy` overrides it.
const LIBRARY_POLICY: &str = include_str!("../policies/library.toml");

// ── CLI definition ────────────────────────────────────────────────────────────

/// WARDEN: rule-based permission expressions with evaluation traces.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "WARDEN permission engine demo",
    long_about = "Builds permission expressions from entity and field rules and prints\n\
                  their traces before and after evaluation."
)]
struct Cli {
    /// TOML dictionary for the library scenario.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Print traces without ANSI colours.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Any-field read: field rules first, then the entity rule.
    AnyField,
    /// Update of one field carrying a change descriptor.
    SpecificField,
    /// Share with and without a share rule.
    Share,
    /// Library catalogue requests through the two-phase executor.
    Library,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let options = Options {
        style: if cli.plain { TraceStyle::Plain } else { TraceStyle::Ansi },
    };

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(&options, cli.policy.as_ref()),
        Command::AnyField => scenarios::any_field(&options),
        Command::SpecificField => scenarios::specific_field(&options),
        Command::Share => scenarios::share(&options),
        Command::Library => run_library(&options, cli.policy.as_ref()),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(options: &Options, policy: Option<&PathBuf>) -> WardenResult<()> {
    scenarios::any_field(options)?;
    scenarios::specific_field(options)?;
    scenarios::share(options)?;
    run_library(options, policy)?;
    Ok(())
}

fn run_library(options: &Options, policy: Option<&PathBuf>) -> WardenResult<()> {
    let dictionary = match policy {
        Some(path) => EntityDictionary::from_file(path)?,
        None => EntityDictionary::from_toml_str(LIBRARY_POLICY)?,
    };
    dictionary.validate()?;
    scenarios::library(options, dictionary)
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("WARDEN Permission Expressions");
    println!("=============================");
    println!();
    println!("Per request:");
    println!("  [1] Rules for the entity and its fields are parsed into check trees");
    println!("  [2] Operation tree is evaluated; commit-phase checks stay WAS UNEVALUATED");
    println!("  [3] Undecided requests queue their commit tree");
    println!("  [4] Commit trees run once the operation's final state is known");
    println!();
}
