//! labtrail demo CLI
//!
//! Runs one or all of the three lab scenarios. Each scenario wires the real
//! labtrail components (services, access policy, hash-chained ledger,
//! verifier, certifier) over fictional lab data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- certify
//!   cargo run -p demo -- tamper
//!   cargo run -p demo -- review-gate

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use labtrail_contracts::error::LabtrailResult;
use labtrail_lab::scenarios::{certification, review_gate, tamper};

// ── CLI definition ────────────────────────────────────────────────────────────

/// labtrail: audited lab records and certified execution reports.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "labtrail lab audit demo",
    long_about = "Runs labtrail demo scenarios showing the audited unit of work,\n\
                  hash-chain verification, tamper detection, certified reports\n\
                  and the human review gate for AI extractions."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three lab scenarios in sequence.
    RunAll,
    /// Scenario 1: Certified bench run (sample to certified report).
    Certify,
    /// Scenario 2: Tamper detection (edited audit journal blocks certification).
    Tamper,
    /// Scenario 3: Human review gate (AI extraction confirm / reject).
    ReviewGate,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=info shows the audit and certification trail.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Certify => certification::run_scenario(),
        Command::Tamper => tamper::run_scenario(),
        Command::ReviewGate => review_gate::run_scenario(),
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

fn run_all() -> LabtrailResult<()> {
    info!("running all scenarios");
    certification::run_scenario()?;
    tamper::run_scenario()?;
    review_gate::run_scenario()?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("labtrail: Audited Lab Records");
    println!("Certified Execution Reports Demo");
    println!("================================");
    println!();
    println!("Per mutation:");
    println!("  [1] Access policy checks the acting user's role → permission");
    println!("  [2] Business rules validate the change");
    println!("  [3] Audit record appended: SHA-256 over content + previous signature");
    println!("  [4] Entity write committed only after the audit append succeeds");
    println!();
    println!("Per certification:");
    println!("  [5] Tenant-wide chain verification; any fault revokes the report");
    println!("  [6] Report rendered, hashed, stored and marked CERTIFIED");
    println!();
}
