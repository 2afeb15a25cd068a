//! # probity-chain
//!
//! Append-only, SHA-256 hash-chained ledger engine for Probity.
//!
//! ## Overview
//!
//! Every business record appended through [`HashChainEngine`] becomes a
//! `LedgerEntry` that commits to the record's canonical bytes and to the
//! previous entry's digest.  Altering any stored entry, or the external
//! record behind it, breaks recomputation and is detected by the verifier.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use probity_chain::{HashChainEngine, InMemoryLedgerStore};
//! use probity_core::Canonicalizer;
//!
//! let engine = HashChainEngine::new(
//!     Arc::new(InMemoryLedgerStore::new()),
//!     Arc::new(Canonicalizer::default()),
//! );
//! let entry = engine.append(&chain_id, &record, &actor_id, LedgerAction::for_record(&record))?;
//! ```

pub mod chain;
pub mod engine;
pub mod memory;

pub use chain::{check_link, checkpoint_root, entry_digest, payload_digest};
pub use engine::HashChainEngine;
pub use memory::{InMemoryLedgerStore, InMemoryRecordStore, StoredRecord};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use chrono::{TimeZone, Utc};

    use probity_contracts::{
        digest::Digest,
        entry::{ChainHead, Checkpoint, LedgerAction, LedgerEntry},
        error::{LedgerError, LedgerResult},
        ids::{ActorId, ChainId},
        policy::RetryPolicy,
        record::{
            DecimalAmount, LedgerRecord, TransactionKind, TransactionRecord, TransactionStatus,
        },
        verify::Divergence,
    };
    use probity_core::{traits::LedgerStore, traits::RecordStore, Canonicalizer};

    use super::{check_link, entry_digest, HashChainEngine, InMemoryLedgerStore, InMemoryRecordStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn donation(id: &str, amount: &str) -> LedgerRecord {
        LedgerRecord::Transaction(TransactionRecord {
            transaction_id: id.to_string(),
            donor_id: Some("donor-1".to_string()),
            kind: TransactionKind::Financial,
            amount: DecimalAmount::new(amount),
            currency: "INR".to_string(),
            in_kind_items: Vec::new(),
            payment_provider: None,
            payment_ref: None,
            campaign_id: None,
            status: TransactionStatus::Completed,
            created_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap(),
            receipt_id: None,
        })
    }

    fn engine_with_store() -> (HashChainEngine, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let engine = HashChainEngine::new(store.clone(), Arc::new(Canonicalizer::default()));
        (engine, store)
    }

    fn append(engine: &HashChainEngine, chain: &ChainId, id: &str, amount: &str) -> LedgerEntry {
        let record = donation(id, amount);
        engine
            .append(chain, &record, &ActorId::from("admin-1"), LedgerAction::TransactionRecorded)
            .unwrap()
    }

    // ── Append ────────────────────────────────────────────────────────────────

    /// The first entry takes sequence 0 and links to the genesis digest.
    #[test]
    fn test_first_append_links_to_genesis() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        assert!(engine.head(&chain).unwrap().is_none());

        let entry = append(&engine, &chain, "tx-a", "500");
        assert_eq!(entry.sequence, 0);
        assert_eq!(entry.prev_digest, Digest::GENESIS);
        assert!(!entry.digest.is_genesis());
        assert_eq!(store.head(&chain).unwrap(), Some(entry.head()));
    }

    /// Sequences are 0, 1, 2 … and each entry links to its predecessor.
    #[test]
    fn test_sequences_and_links() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        let entries: Vec<_> = ["500", "1000", "250"]
            .iter()
            .enumerate()
            .map(|(i, amount)| append(&engine, &chain, &format!("tx-{i}"), amount))
            .collect();

        let mut prev = Digest::GENESIS;
        for (idx, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
            assert!(check_link(entry, &chain, idx as u64, &prev).is_ok());
            prev = entry.digest;
        }
        assert_eq!(store.entries(&chain, 0, 2).unwrap(), entries);
    }

    /// Stored entries are timestamped at millisecond precision so the digest
    /// survives serialization.
    #[test]
    fn test_entry_survives_serialization() {
        let (engine, _) = engine_with_store();
        let entry = append(&engine, &ChainId::from("ngo-1"), "tx-a", "500");

        let json = serde_json::to_string(&entry).unwrap();
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry_digest(&back), entry.digest);
    }

    #[test]
    fn test_action_mismatch_rejected_before_commit() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        let err = engine
            .append(&chain, &donation("tx-a", "1"), &ActorId::from("a"), LedgerAction::AdminAction)
            .unwrap_err();

        assert!(matches!(err, LedgerError::ActionMismatch { .. }), "got {err:?}");
        assert!(store.head(&chain).unwrap().is_none());
    }

    #[test]
    fn test_canonicalization_error_leaves_chain_untouched() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        append(&engine, &chain, "tx-a", "500");

        let err = engine
            .append(
                &chain,
                &donation("tx-b", "not-a-number"),
                &ActorId::from("a"),
                LedgerAction::TransactionRecorded,
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::Canonicalization(_)), "got {err:?}");
        assert_eq!(store.head(&chain).unwrap().map(|h| h.sequence), Some(0));
    }

    // ── Compare-and-swap ──────────────────────────────────────────────────────

    /// Two commits against the same observed head: exactly one wins.
    #[test]
    fn test_concurrent_commit_same_head_conflicts() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        let first = append(&engine, &chain, "tx-a", "500");
        let observed = store.head(&chain).unwrap();

        let mut rival_a = first.clone();
        rival_a.sequence = 1;
        rival_a.prev_digest = first.digest;
        rival_a.digest = entry_digest(&rival_a);

        let mut rival_b = rival_a.clone();
        rival_b.actor_id = ActorId::from("someone-else");
        rival_b.digest = entry_digest(&rival_b);

        assert!(store.append(rival_a, observed).is_ok());
        match store.append(rival_b, observed) {
            Err(LedgerError::ChainConflict { attempted, .. }) => assert_eq!(attempted, 1),
            other => panic!("expected ChainConflict, got {:?}", other),
        }
        assert_eq!(store.head(&chain).unwrap().map(|h| h.sequence), Some(1));
    }

    /// Rewriting an existing sequence is rejected by the store.
    #[test]
    fn test_store_rejects_rewrite() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        let first = append(&engine, &chain, "tx-a", "500");
        append(&engine, &chain, "tx-b", "1000");

        let err = store.append(first.clone(), None).unwrap_err();
        assert!(matches!(err, LedgerError::ChainConflict { .. }), "got {err:?}");
        assert_eq!(store.entry(&chain, 0).unwrap(), Some(first));
    }

    /// Many threads appending with retry: every sequence assigned once.
    #[test]
    fn test_parallel_appends_assign_unique_sequences() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let engine = Arc::new(
            HashChainEngine::new(store.clone(), Arc::new(Canonicalizer::default())).with_retry_policy(
                RetryPolicy {
                    max_attempts: 1_000,
                    initial_backoff_ms: 0,
                    max_backoff_ms: 1,
                },
            ),
        );
        let chain = ChainId::from("ngo-busy");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = engine.clone();
                let chain = chain.clone();
                thread::spawn(move || {
                    (0..10)
                        .map(|i| {
                            let record = donation(&format!("tx-{t}-{i}"), "10");
                            engine
                                .append_with_retry(
                                    &chain,
                                    &record,
                                    &ActorId::from("worker"),
                                    LedgerAction::TransactionRecorded,
                                )
                                .unwrap()
                                .sequence
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let sequences: HashSet<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(sequences.len(), 80);
        assert_eq!(sequences.iter().max(), Some(&79));

        let entries = store.entries(&chain, 0, 79).unwrap();
        let mut prev = Digest::GENESIS;
        for (idx, entry) in entries.iter().enumerate() {
            assert!(check_link(entry, &chain, idx as u64, &prev).is_ok());
            prev = entry.digest;
        }
    }

    /// Retry gives up after `max_attempts` and surfaces the conflict.
    #[test]
    fn test_retry_is_bounded() {
        struct AlwaysConflict(InMemoryLedgerStore);

        impl LedgerStore for AlwaysConflict {
            fn head(&self, c: &ChainId) -> LedgerResult<Option<ChainHead>> {
                self.0.head(c)
            }
            fn append(
                &self,
                entry: LedgerEntry,
                _expected: Option<ChainHead>,
            ) -> LedgerResult<ChainHead> {
                Err(LedgerError::ChainConflict {
                    chain_id: entry.chain_id.to_string(),
                    attempted: entry.sequence,
                })
            }
            fn entry(&self, c: &ChainId, s: u64) -> LedgerResult<Option<LedgerEntry>> {
                self.0.entry(c, s)
            }
            fn entries(&self, c: &ChainId, f: u64, t: u64) -> LedgerResult<Vec<LedgerEntry>> {
                self.0.entries(c, f, t)
            }
            fn find_by_digest(&self, c: &ChainId, d: &Digest) -> LedgerResult<Option<LedgerEntry>> {
                self.0.find_by_digest(c, d)
            }
            fn put_checkpoint(&self, cp: Checkpoint) -> LedgerResult<()> {
                self.0.put_checkpoint(cp)
            }
            fn checkpoints(&self, c: &ChainId) -> LedgerResult<Vec<Checkpoint>> {
                self.0.checkpoints(c)
            }
        }

        let engine = HashChainEngine::new(
            Arc::new(AlwaysConflict(InMemoryLedgerStore::new())),
            Arc::new(Canonicalizer::default()),
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        });

        let err = engine
            .append_with_retry(
                &ChainId::from("ngo-1"),
                &donation("tx-a", "1"),
                &ActorId::from("a"),
                LedgerAction::TransactionRecorded,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::ChainConflict { .. }));
    }

    /// Chains of different organizations are independent.
    #[test]
    fn test_chains_are_independent() {
        let (engine, store) = engine_with_store();
        let a = ChainId::from("ngo-a");
        let b = ChainId::from("ngo-b");
        append(&engine, &a, "tx-1", "1");
        append(&engine, &a, "tx-2", "2");
        let first_b = append(&engine, &b, "tx-3", "3");

        assert_eq!(first_b.sequence, 0);
        assert_eq!(first_b.prev_digest, Digest::GENESIS);
        assert_eq!(store.head(&a).unwrap().map(|h| h.sequence), Some(1));
        assert_eq!(store.chain_ids().unwrap(), vec![a, b]);
    }

    // ── Tampering ─────────────────────────────────────────────────────────────

    /// Mutating a stored entry's header breaks its digest.
    #[test]
    fn test_header_tamper_detected() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        append(&engine, &chain, "tx-a", "500");

        {
            let chains = store.chains.read().unwrap();
            let mut log = chains.get(&chain).unwrap().lock().unwrap();
            log.entries[0].actor_id = ActorId::from("intruder");
        }

        let entry = store.entry(&chain, 0).unwrap().unwrap();
        assert!(matches!(
            check_link(&entry, &chain, 0, &Digest::GENESIS),
            Err(Divergence::DigestMismatch { .. })
        ));
    }

    // ── Checkpoint storage ────────────────────────────────────────────────────

    #[test]
    fn test_checkpoints_must_be_contiguous() {
        let (engine, store) = engine_with_store();
        let chain = ChainId::from("ngo-1");
        for i in 0..4 {
            append(&engine, &chain, &format!("tx-{i}"), "1");
        }
        let cp = |from, to| Checkpoint {
            chain_id: chain.clone(),
            from_sequence: from,
            to_sequence: to,
            root_digest: Digest([7; 32]),
            created_at: Utc::now(),
        };

        assert!(matches!(store.put_checkpoint(cp(1, 2)), Err(LedgerError::InvalidRange { .. })));
        store.put_checkpoint(cp(0, 1)).unwrap();
        assert!(matches!(store.put_checkpoint(cp(0, 1)), Err(LedgerError::InvalidRange { .. })));
        assert!(matches!(store.put_checkpoint(cp(2, 9)), Err(LedgerError::InvalidRange { .. })));
        store.put_checkpoint(cp(2, 3)).unwrap();

        let stored = store.checkpoints(&chain).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(store.latest_checkpoint(&chain).unwrap().map(|c| c.to_sequence), Some(3));
    }

    // ── Record store ──────────────────────────────────────────────────────────

    #[test]
    fn test_audit_hash_written_once() {
        let records = InMemoryRecordStore::new();
        let resource = records.insert(donation("tx-a", "500")).unwrap();

        records.attach_audit_hash(&resource, Digest([1; 32])).unwrap();
        records.attach_audit_hash(&resource, Digest([1; 32])).unwrap();
        let err = records.attach_audit_hash(&resource, Digest([2; 32])).unwrap_err();

        assert!(matches!(err, LedgerError::AuditHashAlreadySet { .. }));
        assert_eq!(records.audit_hash(&resource).unwrap(), Some(Digest([1; 32])));
    }

    #[test]
    fn test_replace_keeps_audit_hash() {
        let records = InMemoryRecordStore::new();
        let resource = records.insert(donation("tx-a", "500")).unwrap();
        records.attach_audit_hash(&resource, Digest([1; 32])).unwrap();

        records.replace(&resource, donation("tx-a", "501")).unwrap();
        let stored = records.get(&resource).unwrap().unwrap();
        assert_eq!(stored.audit_hash, Some(Digest([1; 32])));
        assert_eq!(stored.record, donation("tx-a", "501"));
        assert!(records.insert(donation("tx-a", "1")).is_err());
    }
}
