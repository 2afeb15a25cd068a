//! NGO reference runtime demo scenarios.
//!
//! Each scenario is a self-contained module that builds a ledger over
//! in-memory stores, drives it with mock NGO data, and demonstrates one
//! property of the chain.  `run` returns what happened so tests can check
//! it; `run_scenario` prints it.

use std::sync::Arc;

use probity_chain::InMemoryRecordStore;
use probity_contracts::{
    entry::LedgerEntry,
    error::LedgerResult,
    ids::ChainId,
    record::LedgerRecord,
    verify::VerificationResult,
};

use crate::{ledger::NgoLedger, mock_data};

pub mod checkpoint_anchor;
pub mod concurrent_appends;
pub mod donation_audit;
pub mod receipt_verification;
pub mod tamper_detection;

/// Save each record to the platform store, then bind it into the chain as
/// the staff member who would have made it.
pub(crate) fn record_all(
    ledger: &NgoLedger,
    records: &Arc<InMemoryRecordStore>,
    chain_id: &ChainId,
    batch: Vec<LedgerRecord>,
) -> LedgerResult<Vec<LedgerEntry>> {
    batch
        .into_iter()
        .map(|record| {
            let actor_id = mock_data::actor_for(&record);
            let resource = records.insert(record)?;
            ledger.record(chain_id, &resource, &actor_id)
        })
        .collect()
}

pub(crate) fn print_entry(entry: &LedgerEntry) {
    println!(
        "  #{:<3} {:<26} {:<34} {}",
        entry.sequence,
        entry.action.as_str(),
        entry.resource.to_string(),
        entry.digest.short()
    );
}

pub(crate) fn print_verification(label: &str, result: &VerificationResult) {
    if result.ok {
        println!(
            "  {:<24} OK ({} entr{} verified, {}..={})",
            label,
            result.entries_verified,
            if result.entries_verified == 1 { "y" } else { "ies" },
            result.from_sequence,
            result.to_sequence
        );
    } else {
        println!(
            "  {:<24} DIVERGED at sequence {}",
            label,
            result
                .first_divergence
                .map(|s| s.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        if let Some(divergence) = &result.divergence {
            println!("  {:<24} {}", "", divergence);
        }
    }
}
