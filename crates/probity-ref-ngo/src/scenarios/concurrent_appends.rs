//! Scenario 4: Concurrent Appends
//!
//! Several payment-webhook workers record donations for the same
//! organization at once while a second organization records its own.
//! Workers on the same chain race for the head; losers get
//! `ChainConflict`, re-read the head, and retry.  Every donation ends up on
//! the chain exactly once with a unique sequence, and the two chains never
//! wait on each other.

use std::{collections::BTreeSet, thread};

use tracing::debug;
use uuid::Uuid;

use probity_chain::InMemoryRecordStore;
use probity_config::LedgerConfig;
use probity_contracts::{
    entry::LedgerEntry,
    error::{LedgerError, LedgerResult},
    ids::ChainId,
    policy::{CheckpointPolicy, RetryPolicy},
    verify::VerificationResult,
};

use crate::{ledger::NgoLedger, mock_data};

use super::print_verification;

pub const WORKERS: usize = 4;
pub const DONATIONS_PER_WORKER: usize = 15;

/// The second organization's chain.
pub fn neighbour_chain() -> ChainId {
    ChainId::new("gram-vikas-foundation")
}

pub struct ConcurrentAppends {
    pub entries: Vec<LedgerEntry>,
    pub neighbour_entries: Vec<LedgerEntry>,
    pub verification: VerificationResult,
    pub neighbour_verification: VerificationResult,
    pub checkpoints: usize,
}

fn worker(
    ledger: &NgoLedger,
    records: &InMemoryRecordStore,
    chain: &ChainId,
    worker: usize,
) -> LedgerResult<Vec<LedgerEntry>> {
    (0..DONATIONS_PER_WORKER)
        .map(|i| {
            let transaction_id = format!("txn-{}", Uuid::new_v4());
            let amount = format!("{}.{:02}", 100 + worker * 10 + i, i);
            let resource = records.insert(mock_data::donation(
                &transaction_id,
                &format!("donor-{worker}-{i}"),
                &amount,
            ))?;
            let entry = ledger.record(chain, &resource, &mock_data::treasurer())?;
            debug!(worker, sequence = entry.sequence, "donation recorded");
            Ok(entry)
        })
        .collect()
}

pub fn run(config: &LedgerConfig) -> LedgerResult<ConcurrentAppends> {
    let config = LedgerConfig {
        retry: RetryPolicy {
            max_attempts: config.retry.max_attempts.max(200),
            initial_backoff_ms: 1,
            max_backoff_ms: 8,
        },
        checkpoint: CheckpointPolicy {
            interval_entries: 10,
        },
        ..config.clone()
    };
    let (ledger, records) = NgoLedger::in_memory(&config);
    let chain = mock_data::chain_id();
    let neighbour = neighbour_chain();

    let (batches, neighbour_entries) = thread::scope(|s| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|w| {
                let (ledger, records, chain) = (&ledger, &records, &chain);
                s.spawn(move || worker(ledger, records, chain, w))
            })
            .collect();
        let neighbour_handle = s.spawn(|| worker(&ledger, &records, &neighbour, WORKERS));

        let panicked = |_| {
            Err(LedgerError::Store {
                reason: "donation worker panicked".to_string(),
            })
        };
        let batches: Vec<LedgerResult<Vec<LedgerEntry>>> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(panicked))
            .collect();
        let neighbour_entries = neighbour_handle.join().unwrap_or_else(panicked);
        (batches, neighbour_entries)
    });

    let mut entries = Vec::with_capacity(WORKERS * DONATIONS_PER_WORKER);
    for batch in batches {
        entries.extend(batch?);
    }
    entries.sort_by_key(|e| e.sequence);
    let neighbour_entries = neighbour_entries?;

    Ok(ConcurrentAppends {
        verification: ledger.verify_segments(&chain)?,
        neighbour_verification: ledger.verify_chain(&neighbour)?,
        checkpoints: ledger.checkpoints(&chain)?.len(),
        entries,
        neighbour_entries,
    })
}

pub fn run_scenario(config: &LedgerConfig) -> LedgerResult<()> {
    println!("=== Scenario 4: Concurrent Appends ===");
    println!();

    let outcome = run(config)?;

    let unique: BTreeSet<u64> = outcome.entries.iter().map(|e| e.sequence).collect();
    println!(
        "  {} workers x {} donations on {}",
        WORKERS,
        DONATIONS_PER_WORKER,
        mock_data::chain_id()
    );
    println!(
        "  Entries committed:       {} ({} unique sequences)",
        outcome.entries.len(),
        unique.len()
    );
    println!("  Scheduled checkpoints:   {}", outcome.checkpoints);
    print_verification("Segmented verification:", &outcome.verification);
    println!();
    println!(
        "  In parallel on {}: {} entries",
        neighbour_chain(),
        outcome.neighbour_entries.len()
    );
    print_verification("Full verification:", &outcome.neighbour_verification);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every donation lands once, sequences are dense, and both chains verify.
    #[test]
    fn test_racing_workers_produce_one_dense_chain() {
        let outcome = run(&LedgerConfig::default()).unwrap();
        let total = (WORKERS * DONATIONS_PER_WORKER) as u64;

        let sequences: Vec<u64> = outcome.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(
            sequences,
            (0..total).collect::<Vec<_>>(),
            "sequences must be 0..{total} with no gaps"
        );
        for pair in outcome.entries.windows(2) {
            assert_eq!(pair[1].prev_digest, pair[0].digest);
        }

        assert!(outcome.verification.ok, "{:?}", outcome.verification.divergence);
        assert_eq!(outcome.verification.entries_verified, total);
        // Each scheduled checkpoint seals at least ten entries.
        assert!(
            (1..=(total / 10) as usize).contains(&outcome.checkpoints),
            "unexpected checkpoint count {}",
            outcome.checkpoints
        );
    }

    #[test]
    fn test_neighbour_chain_is_independent() {
        let outcome = run(&LedgerConfig::default()).unwrap();
        assert_eq!(outcome.neighbour_entries.len(), DONATIONS_PER_WORKER);
        assert_eq!(outcome.neighbour_entries[0].sequence, 0);
        assert!(outcome.neighbour_verification.ok);
    }
}
