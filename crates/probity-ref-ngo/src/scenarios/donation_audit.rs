//! Scenario 1: Donation Audit Trail
//!
//! Records the first week of a flood-relief campaign (financial and in-kind
//! donations, an inventory distribution, and admin actions) on the
//! organization's chain, then verifies it end to end.
//!
//! A donation with a sub-paisa amount is also submitted.  It fails
//! canonicalization and never reaches the chain.

use probity_config::LedgerConfig;
use probity_contracts::{
    entry::LedgerEntry,
    error::{LedgerError, LedgerResult},
    verify::{ChainStatus, VerificationResult},
};

use crate::{ledger::NgoLedger, mock_data};

use super::{print_entry, print_verification, record_all};

pub struct DonationAudit {
    pub entries: Vec<LedgerEntry>,
    pub verification: VerificationResult,
    pub status: ChainStatus,

    /// Why the malformed donation was refused.
    pub rejected: LedgerError,
}

pub fn run(config: &LedgerConfig) -> LedgerResult<DonationAudit> {
    let (ledger, records) = NgoLedger::in_memory(config);
    let chain = mock_data::chain_id();

    let mut batch = mock_data::opening_week();
    batch.push(mock_data::in_kind_donation()?);
    let entries = record_all(&ledger, &records, &chain, batch)?;

    let malformed = records.insert(mock_data::donation("txn-D", "donor-ravi", "99.999"))?;
    let rejected = match ledger.record(&chain, &malformed, &mock_data::treasurer()) {
        Err(e) => e,
        Ok(entry) => {
            return Err(LedgerError::Store {
                reason: format!("malformed donation was recorded at sequence {}", entry.sequence),
            })
        }
    };

    let verification = ledger.verify_chain(&chain)?;
    let status = ledger.chain_status(&chain)?;

    Ok(DonationAudit {
        entries,
        verification,
        status,
        rejected,
    })
}

pub fn run_scenario(config: &LedgerConfig) -> LedgerResult<()> {
    println!("=== Scenario 1: Donation Audit Trail ===");
    println!();

    let outcome = run(config)?;

    println!("  Chain: {}", outcome.status.chain_id);
    for entry in &outcome.entries {
        print_entry(entry);
    }
    println!();
    println!("  Rejected before append: {}", outcome.rejected);
    println!();
    print_verification("Full chain:", &outcome.verification);
    if let Some(head) = outcome.status.head {
        println!("  Head:                    #{} {}", head.sequence, head.digest);
    }
    println!("  Entries on chain:        {}", outcome.status.entry_count);
    println!(
        "  RESULT: {}",
        if outcome.verification.ok { "VERIFIED" } else { "FAILED" }
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use probity_contracts::{
        digest::Digest,
        entry::LedgerAction,
        error::{CanonicalizationError, LedgerError},
    };

    use super::*;

    #[test]
    fn test_opening_week_chain_links_and_verifies() {
        let outcome = run(&LedgerConfig::default()).unwrap();
        assert_eq!(outcome.entries.len(), mock_data::opening_week().len() + 1);

        let mut prev = Digest::GENESIS;
        for (i, entry) in outcome.entries.iter().enumerate() {
            assert_eq!(entry.sequence, i as u64);
            assert_eq!(entry.prev_digest, prev, "entry {} must link to its predecessor", i);
            prev = entry.digest;
        }
        assert!(outcome.verification.ok);
        assert_eq!(outcome.verification.entries_verified, outcome.entries.len() as u64);
    }

    /// Each record kind is filed under its own action.
    #[test]
    fn test_actions_follow_record_kind() {
        let outcome = run(&LedgerConfig::default()).unwrap();
        let actions: Vec<LedgerAction> = outcome.entries.iter().map(|e| e.action).collect();
        assert!(actions.contains(&LedgerAction::TransactionRecorded));
        assert!(actions.contains(&LedgerAction::InventoryStatusChanged));
        assert!(actions.contains(&LedgerAction::AdminAction));
        assert_eq!(outcome.entries[3].actor_id, mock_data::administrator());
    }

    /// The sub-paisa donation is refused without touching the chain.
    #[test]
    fn test_malformed_donation_never_appended() {
        let outcome = run(&LedgerConfig::default()).unwrap();
        match outcome.rejected {
            LedgerError::Canonicalization(CanonicalizationError::ExcessPrecision { exponent, .. }) => {
                assert_eq!(exponent, 2)
            }
            other => panic!("expected ExcessPrecision, got {:?}", other),
        }
        assert_eq!(outcome.status.entry_count, outcome.entries.len() as u64);
    }

    #[test]
    fn test_run_scenario() {
        assert!(run_scenario(&LedgerConfig::default()).is_ok());
    }
}
