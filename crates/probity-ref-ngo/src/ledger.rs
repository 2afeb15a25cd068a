//! The NGO-facing ledger facade.
//!
//! `NgoLedger` wires the engine, verifier, and checkpoint service over one
//! ledger store and one external record store, and adds the platform flow
//! on top of the raw operations: a saved record is appended with retry, its
//! digest is written back as the record's audit hash, and a checkpoint is cut
//! when one is due.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use probity_chain::{HashChainEngine, InMemoryLedgerStore, InMemoryRecordStore};
use probity_config::LedgerConfig;
use probity_contracts::{
    entry::{ChainHead, Checkpoint, LedgerAction, LedgerEntry},
    error::{LedgerError, LedgerResult},
    ids::{ActorId, ChainId, ResourceRef},
    record::LedgerRecord,
    verify::{ChainStatus, ReceiptStatus, VerificationResult},
};
use probity_core::traits::{LedgerStore, RecordStore};
use probity_verify::{ChainVerifier, CheckpointService};

pub struct NgoLedger {
    store: Arc<dyn LedgerStore>,
    records: Arc<dyn RecordStore>,
    engine: HashChainEngine,
    verifier: Arc<ChainVerifier>,
    checkpoints: CheckpointService,

    /// One lock per resource currently being recorded.
    recording: Mutex<HashMap<ResourceRef, Arc<Mutex<()>>>>,
}

impl NgoLedger {
    pub fn new(store: Arc<dyn LedgerStore>, records: Arc<dyn RecordStore>, config: &LedgerConfig) -> Self {
        let canonicalizer = Arc::new(config.canonicalizer());
        let engine = HashChainEngine::new(Arc::clone(&store), Arc::clone(&canonicalizer))
            .with_retry_policy(config.retry.clone());
        let verifier = Arc::new(ChainVerifier::new(
            Arc::clone(&store),
            Arc::clone(&records),
            canonicalizer,
        ));
        let checkpoints = CheckpointService::new(Arc::clone(&store), Arc::clone(&verifier))
            .with_policy(config.checkpoint.clone());
        Self {
            store,
            records,
            engine,
            verifier,
            checkpoints,
            recording: Mutex::new(HashMap::new()),
        }
    }

    /// A ledger over fresh in-memory stores.  The record store is returned
    /// too, so callers can save (and, in demos, tamper with) records.
    pub fn in_memory(config: &LedgerConfig) -> (Self, Arc<InMemoryRecordStore>) {
        let records = Arc::new(InMemoryRecordStore::new());
        let ledger = Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::clone(&records) as Arc<dyn RecordStore>,
            config,
        );
        (ledger, records)
    }

    // ── Core operations ───────────────────────────────────────────────────────

    /// Append one record, attempting the commit once.
    pub fn append(
        &self,
        chain_id: &ChainId,
        record: &LedgerRecord,
        actor_id: &ActorId,
        action: LedgerAction,
    ) -> LedgerResult<LedgerEntry> {
        self.engine.append(chain_id, record, actor_id, action)
    }

    pub fn verify_range(&self, chain_id: &ChainId, from: u64, to: u64) -> LedgerResult<VerificationResult> {
        self.verifier.verify_range(chain_id, from, to)
    }

    /// # Errors
    ///
    /// `ChainNotInitialized` for a chain with no entries, `NotFound` for a
    /// sequence past its head.
    pub fn get_entry(&self, chain_id: &ChainId, sequence: u64) -> LedgerResult<LedgerEntry> {
        if self.store.head(chain_id)?.is_none() {
            return Err(LedgerError::ChainNotInitialized {
                chain_id: chain_id.to_string(),
            });
        }
        self.store
            .entry(chain_id, sequence)?
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("sequence {sequence} on chain '{chain_id}'"),
            })
    }

    pub fn create_checkpoint(&self, chain_id: &ChainId, upto: u64) -> LedgerResult<Checkpoint> {
        self.checkpoints.create_checkpoint(chain_id, upto)
    }

    pub fn verify_checkpoint(&self, checkpoint: &Checkpoint) -> LedgerResult<bool> {
        self.checkpoints.verify_checkpoint(checkpoint)
    }

    // ── Platform flow ─────────────────────────────────────────────────────────

    /// Bind an already-saved record into `chain_id`.
    ///
    /// Loads the record from the record store, appends it with bounded retry,
    /// writes the entry digest back as its audit hash, and cuts a checkpoint
    /// if one is due.
    ///
    /// A record that already carries an audit hash is rejected with
    /// `AuditHashAlreadySet` before anything is appended.  Concurrent calls
    /// for the same resource through this ledger are serialized, so exactly
    /// one of them appends.  A failed scheduled checkpoint is logged, not
    /// returned: the entry has already committed.
    pub fn record(&self, chain_id: &ChainId, resource: &ResourceRef, actor_id: &ActorId) -> LedgerResult<LedgerEntry> {
        let lock = self.claim(resource)?;
        let recorded = match lock.lock() {
            Ok(_held) => self.bind(chain_id, resource, actor_id),
            Err(_) => Err(LedgerError::Store {
                reason: format!("record lock for {resource} poisoned"),
            }),
        };
        self.release(resource, lock);
        let entry = recorded?;

        match self.checkpoints.checkpoint_if_due(chain_id) {
            Ok(Some(checkpoint)) => info!(
                chain_id = %chain_id,
                to = checkpoint.to_sequence,
                "scheduled checkpoint cut"
            ),
            Ok(None) => {}
            // The entry is committed either way.
            Err(e) => warn!(
                chain_id = %chain_id,
                sequence = entry.sequence,
                error = %e,
                "scheduled checkpoint failed"
            ),
        }
        Ok(entry)
    }

    pub fn verify_chain(&self, chain_id: &ChainId) -> LedgerResult<VerificationResult> {
        self.verifier.verify_chain(chain_id)
    }

    pub fn verify_segments(&self, chain_id: &ChainId) -> LedgerResult<VerificationResult> {
        self.verifier.verify_segments(chain_id)
    }

    pub fn verify_receipt(&self, chain_id: &ChainId, resource: &ResourceRef) -> LedgerResult<ReceiptStatus> {
        self.verifier.verify_receipt(chain_id, resource)
    }

    pub fn head(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainHead>> {
        self.store.head(chain_id)
    }

    pub fn checkpoints(&self, chain_id: &ChainId) -> LedgerResult<Vec<Checkpoint>> {
        self.store.checkpoints(chain_id)
    }

    /// Public transparency summary of one chain.
    pub fn chain_status(&self, chain_id: &ChainId) -> LedgerResult<ChainStatus> {
        let head = self.store.head(chain_id)?;
        Ok(ChainStatus {
            chain_id: chain_id.clone(),
            head,
            entry_count: head.map_or(0, |h| h.sequence + 1),
            last_checkpoint: self.store.latest_checkpoint(chain_id)?,
        })
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Check, append, and attach.  Callers hold the resource's lock.
    fn bind(&self, chain_id: &ChainId, resource: &ResourceRef, actor_id: &ActorId) -> LedgerResult<LedgerEntry> {
        if self.records.audit_hash(resource)?.is_some() {
            return Err(LedgerError::AuditHashAlreadySet {
                resource: resource.to_string(),
            });
        }
        let record = self
            .records
            .load(resource)?
            .ok_or_else(|| LedgerError::NotFound {
                what: format!("record {resource}"),
            })?;

        let entry = self.engine.append_with_retry(
            chain_id,
            &record,
            actor_id,
            LedgerAction::for_record(&record),
        )?;
        self.records.attach_audit_hash(resource, entry.digest)?;
        Ok(entry)
    }

    fn claim(&self, resource: &ResourceRef) -> LedgerResult<Arc<Mutex<()>>> {
        let mut recording = self.recording.lock().map_err(|_| LedgerError::Store {
            reason: "record lock table poisoned".to_string(),
        })?;
        Ok(Arc::clone(recording.entry(resource.clone()).or_default()))
    }

    /// Drop the resource's lock from the table once no other caller holds it.
    fn release(&self, resource: &ResourceRef, lock: Arc<Mutex<()>>) {
        if let Ok(mut recording) = self.recording.lock() {
            // The table's copy plus ours.
            if Arc::strong_count(&lock) <= 2 {
                recording.remove(resource);
            }
            drop(lock);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    use probity_chain::{InMemoryLedgerStore, InMemoryRecordStore};
    use probity_config::LedgerConfig;
    use probity_contracts::{
        digest::Digest,
        entry::LedgerEntry,
        error::{LedgerError, LedgerResult},
        ids::ResourceRef,
        record::LedgerRecord,
        verify::ReceiptStatus,
    };
    use probity_core::traits::RecordStore;

    use super::NgoLedger;
    use crate::mock_data;

    fn ledger() -> (NgoLedger, Arc<InMemoryRecordStore>) {
        NgoLedger::in_memory(&LedgerConfig::default())
    }

    /// `record` appends, writes the audit hash back, and the receipt verifies.
    #[test]
    fn test_record_writes_audit_hash() {
        let (ledger, records) = ledger();
        let chain = mock_data::chain_id();
        let resource = records.insert(mock_data::donation("txn-1", "donor-1", "500")).unwrap();

        let entry = ledger.record(&chain, &resource, &mock_data::treasurer()).unwrap();
        let stored = records.get(&resource).unwrap().unwrap();
        assert_eq!(stored.audit_hash, Some(entry.digest));

        match ledger.verify_receipt(&chain, &resource).unwrap() {
            ReceiptStatus::Valid { sequence, digest } => {
                assert_eq!(sequence, 0);
                assert_eq!(digest, entry.digest);
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    /// A record already bound to the chain cannot be appended again.
    #[test]
    fn test_record_twice_rejected() {
        let (ledger, records) = ledger();
        let chain = mock_data::chain_id();
        let resource = records.insert(mock_data::donation("txn-1", "donor-1", "500")).unwrap();
        ledger.record(&chain, &resource, &mock_data::treasurer()).unwrap();

        match ledger.record(&chain, &resource, &mock_data::treasurer()) {
            Err(LedgerError::AuditHashAlreadySet { .. }) => {}
            other => panic!("expected AuditHashAlreadySet, got {:?}", other),
        }
        assert_eq!(ledger.chain_status(&chain).unwrap().entry_count, 1);
    }

    /// A record store that answers `load` slowly, holding both callers
    /// between the audit-hash check and the append.
    struct SlowRecords(Arc<InMemoryRecordStore>);

    impl RecordStore for SlowRecords {
        fn load(&self, resource: &ResourceRef) -> LedgerResult<Option<LedgerRecord>> {
            thread::sleep(Duration::from_millis(50));
            self.0.load(resource)
        }
        fn audit_hash(&self, resource: &ResourceRef) -> LedgerResult<Option<Digest>> {
            self.0.audit_hash(resource)
        }
        fn attach_audit_hash(&self, resource: &ResourceRef, digest: Digest) -> LedgerResult<()> {
            self.0.attach_audit_hash(resource, digest)
        }
    }

    /// Two webhook deliveries for the same donation race: one appends, the
    /// other is rejected without touching the chain.
    #[test]
    fn test_concurrent_record_of_same_resource_appends_once() {
        let records = Arc::new(InMemoryRecordStore::new());
        let ledger = NgoLedger::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(SlowRecords(Arc::clone(&records))),
            &LedgerConfig::default(),
        );
        let chain = mock_data::chain_id();
        let resource = records.insert(mock_data::donation("txn-1", "donor-1", "500")).unwrap();
        let start = Barrier::new(2);

        let outcomes: Vec<LedgerResult<LedgerEntry>> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        start.wait();
                        ledger.record(&chain, &resource, &mock_data::treasurer())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let committed: Vec<&LedgerEntry> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        assert_eq!(committed.len(), 1, "exactly one caller may append: {:?}", outcomes);
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, Err(LedgerError::AuditHashAlreadySet { .. }))),
            "the other caller must see the audit hash: {:?}",
            outcomes
        );
        assert_eq!(ledger.chain_status(&chain).unwrap().entry_count, 1);
        assert_eq!(records.get(&resource).unwrap().unwrap().audit_hash, Some(committed[0].digest));
        assert!(ledger.recording.lock().unwrap().is_empty(), "record locks must be released");
    }

    /// Recording something the platform never saved is NotFound.
    #[test]
    fn test_record_unsaved_rejected() {
        let (ledger, _records) = ledger();
        let resource = mock_data::donation("txn-ghost", "donor-1", "1").resource();
        match ledger.record(&mock_data::chain_id(), &resource, &mock_data::treasurer()) {
            Err(LedgerError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    /// `get_entry` distinguishes an unknown chain from an unknown sequence.
    #[test]
    fn test_get_entry_errors() {
        let (ledger, records) = ledger();
        let chain = mock_data::chain_id();
        match ledger.get_entry(&chain, 0) {
            Err(LedgerError::ChainNotInitialized { .. }) => {}
            other => panic!("expected ChainNotInitialized, got {:?}", other),
        }

        let resource = records.insert(mock_data::donation("txn-1", "donor-1", "500")).unwrap();
        let entry = ledger.record(&chain, &resource, &mock_data::treasurer()).unwrap();
        assert_eq!(ledger.get_entry(&chain, 0).unwrap(), entry);
        match ledger.get_entry(&chain, 1) {
            Err(LedgerError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    /// The transparency summary tracks head, count, and last checkpoint.
    #[test]
    fn test_chain_status() {
        let (ledger, records) = ledger();
        let chain = mock_data::chain_id();

        let empty = ledger.chain_status(&chain).unwrap();
        assert_eq!(empty.entry_count, 0);
        assert!(empty.head.is_none());

        for record in mock_data::opening_week() {
            let resource = records.insert(record).unwrap();
            ledger.record(&chain, &resource, &mock_data::treasurer()).unwrap();
        }
        let checkpoint = ledger.create_checkpoint(&chain, 2).unwrap();

        let status = ledger.chain_status(&chain).unwrap();
        assert_eq!(status.entry_count, mock_data::opening_week().len() as u64);
        assert_eq!(status.head.map(|h| h.sequence), Some(status.entry_count - 1));
        assert_eq!(status.last_checkpoint, Some(checkpoint));
    }
}
