//! Probity NGO Reference Runtime: Demo CLI
//!
//! Runs one or all of the five ledger scenarios.  Each scenario uses the real
//! Probity components (canonicalizer, hash chain engine, verifier, checkpoint
//! service) over in-memory stores and mock NGO data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- donation-audit
//!   cargo run -p demo -- tamper-detection
//!   cargo run -p demo -- checkpoint-anchor
//!   cargo run -p demo -- concurrent-appends
//!   cargo run -p demo -- receipt-verification
//!   cargo run -p demo -- --config config/ngo-ledger.toml run-all

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use probity_config::LedgerConfig;
use probity_contracts::error::LedgerResult;
use probity_ref_ngo::scenarios::{
    checkpoint_anchor, concurrent_appends, donation_audit, receipt_verification,
    tamper_detection,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Probity: tamper-evident ledger NGO demo.
///
/// Each subcommand runs one or all of the ledger scenarios, demonstrating
/// hash chaining, tamper detection, checkpoints, and receipt verification.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Probity NGO reference runtime demo",
    long_about = "Runs Probity ledger scenarios showing append-only hash chaining,\n\
                  tamper detection, checkpoint anchoring, and donor receipt checks."
)]
struct Cli {
    /// Ledger configuration (TOML).  Defaults apply when omitted.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all five scenarios in sequence.
    RunAll,
    /// Scenario 1: Donation Audit Trail (mixed records, full verification).
    DonationAudit,
    /// Scenario 2: Tamper Detection (edited and deleted records).
    TamperDetection,
    /// Scenario 3: Checkpoint Anchoring (published roots localize a rewrite).
    CheckpointAnchor,
    /// Scenario 4: Concurrent Appends (compare-and-swap with retry).
    ConcurrentAppends,
    /// Scenario 5: Donor Receipt Verification (Valid / NotRecorded / Invalid).
    ReceiptVerification,
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

    print_banner();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::RunAll => run_all(&config),
        Command::DonationAudit => donation_audit::run_scenario(&config),
        Command::TamperDetection => tamper_detection::run_scenario(&config),
        Command::CheckpointAnchor => checkpoint_anchor::run_scenario(&config),
        Command::ConcurrentAppends => concurrent_appends::run_scenario(&config),
        Command::ReceiptVerification => receipt_verification::run_scenario(&config),
    });

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

fn load_config(path: Option<&std::path::Path>) -> LedgerResult<LedgerConfig> {
    match path {
        Some(path) => {
            let config = LedgerConfig::from_file(path)?;
            info!(path = %path.display(), "using ledger configuration");
            Ok(config)
        }
        None => Ok(LedgerConfig::default()),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(config: &LedgerConfig) -> LedgerResult<()> {
    donation_audit::run_scenario(config)?;
    tamper_detection::run_scenario(config)?;
    checkpoint_anchor::run_scenario(config)?;
    concurrent_appends::run_scenario(config)?;
    receipt_verification::run_scenario(config)?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("PROBITY: Tamper-evident Ledger");
    println!("NGO Reference Demo");
    println!("==============================");
    println!();
    println!("Ledger pipeline per record:");
    println!("  [1] Canonicalizer: record → deterministic bytes (minor units, epoch ms, sorted keys)");
    println!("  [2] Engine: digest = SHA-256(prev digest ‖ payload digest ‖ header)");
    println!("  [3] Store: compare-and-swap on the chain head, append-only");
    println!("  [4] Verifier: re-read the record, recompute every digest, report first divergence");
    println!("  [5] Checkpoints: fold segments into publishable roots");
    println!();
}
