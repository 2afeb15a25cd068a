//! In-memory implementations of `LedgerStore` and `RecordStore`.
//!
//! `InMemoryLedgerStore` is the reference store adapter.  Each chain sits
//! behind its own `Mutex`, and the outer map is only write-locked the first
//! time a chain is seen, so appends to different organizations never wait on
//! one another.
//!
//! `InMemoryRecordStore` stands in for the platform's document store.  Unlike
//! the ledger store it is mutable: `replace` overwrites a record the way a
//! direct database edit would, which is exactly what verification exists to
//! catch.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use tracing::{debug, warn};

use probity_contracts::{
    digest::Digest,
    entry::{ChainHead, Checkpoint, LedgerEntry},
    error::{LedgerError, LedgerResult},
    ids::{ChainId, ResourceRef},
    record::LedgerRecord,
};
use probity_core::traits::{LedgerStore, RecordStore};

fn poisoned(what: &str) -> LedgerError {
    LedgerError::Store {
        reason: format!("{what} lock poisoned"),
    }
}

// ── Ledger store ──────────────────────────────────────────────────────────────

/// The stored state of one chain.
#[derive(Default)]
pub(crate) struct ChainLog {
    /// Entries in sequence order; index == sequence.
    pub(crate) entries: Vec<LedgerEntry>,

    /// Digest → sequence, for receipt lookups.
    pub(crate) by_digest: HashMap<Digest, u64>,

    /// Checkpoints in `to_sequence` order.
    pub(crate) checkpoints: Vec<Checkpoint>,
}

impl ChainLog {
    fn head(&self) -> Option<ChainHead> {
        self.entries.last().map(LedgerEntry::head)
    }
}

/// An append-only ledger store held in process memory.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    pub(crate) chains: RwLock<HashMap<ChainId, Arc<Mutex<ChainLog>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of every chain the store has seen.
    pub fn chain_ids(&self) -> LedgerResult<Vec<ChainId>> {
        let chains = self.chains.read().map_err(|_| poisoned("ledger map"))?;
        let mut ids: Vec<ChainId> = chains.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn existing(&self, chain_id: &ChainId) -> LedgerResult<Option<Arc<Mutex<ChainLog>>>> {
        let chains = self.chains.read().map_err(|_| poisoned("ledger map"))?;
        Ok(chains.get(chain_id).cloned())
    }

    fn get_or_create(&self, chain_id: &ChainId) -> LedgerResult<Arc<Mutex<ChainLog>>> {
        if let Some(log) = self.existing(chain_id)? {
            return Ok(log);
        }
        let mut chains = self.chains.write().map_err(|_| poisoned("ledger map"))?;
        Ok(chains.entry(chain_id.clone()).or_default().clone())
    }

    fn lock(log: &Mutex<ChainLog>) -> LedgerResult<MutexGuard<'_, ChainLog>> {
        log.lock().map_err(|_| poisoned("chain"))
    }

    fn read<T>(
        &self,
        chain_id: &ChainId,
        empty: T,
        f: impl FnOnce(&ChainLog) -> T,
    ) -> LedgerResult<T> {
        match self.existing(chain_id)? {
            Some(log) => {
                let guard = Self::lock(&log)?;
                Ok(f(&guard))
            }
            None => Ok(empty),
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn head(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainHead>> {
        self.read(chain_id, None, ChainLog::head)
    }

    fn append(&self, entry: LedgerEntry, expected_head: Option<ChainHead>) -> LedgerResult<ChainHead> {
        let log = self.get_or_create(&entry.chain_id)?;
        let mut log = Self::lock(&log)?;

        let current = log.head();
        let next_sequence = current.map_or(0, |h| h.sequence + 1);
        if current != expected_head || entry.sequence != next_sequence {
            warn!(
                chain_id = %entry.chain_id,
                attempted = entry.sequence,
                current = ?current.map(|h| h.sequence),
                "append rejected: head moved"
            );
            return Err(LedgerError::ChainConflict {
                chain_id: entry.chain_id.to_string(),
                attempted: entry.sequence,
            });
        }
        let expected_prev = current.map_or(Digest::GENESIS, |h| h.digest);
        if entry.prev_digest != expected_prev {
            return Err(LedgerError::Store {
                reason: format!(
                    "entry {} on '{}' does not extend the committed head",
                    entry.sequence, entry.chain_id
                ),
            });
        }

        let head = entry.head();
        log.by_digest.insert(entry.digest, entry.sequence);
        log.entries.push(entry);
        Ok(head)
    }

    fn entry(&self, chain_id: &ChainId, sequence: u64) -> LedgerResult<Option<LedgerEntry>> {
        self.read(chain_id, None, |log| {
            usize::try_from(sequence)
                .ok()
                .and_then(|idx| log.entries.get(idx))
                .cloned()
        })
    }

    fn entries(&self, chain_id: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>> {
        self.read(chain_id, Vec::new(), |log| {
            log.entries
                .iter()
                .skip_while(|e| e.sequence < from)
                .take_while(|e| e.sequence <= to)
                .cloned()
                .collect()
        })
    }

    fn find_by_digest(&self, chain_id: &ChainId, digest: &Digest) -> LedgerResult<Option<LedgerEntry>> {
        self.read(chain_id, None, |log| {
            log.by_digest
                .get(digest)
                .and_then(|seq| usize::try_from(*seq).ok())
                .and_then(|idx| log.entries.get(idx))
                .cloned()
        })
    }

    fn put_checkpoint(&self, checkpoint: Checkpoint) -> LedgerResult<()> {
        let log = self.existing(&checkpoint.chain_id)?.ok_or_else(|| {
            LedgerError::ChainNotInitialized {
                chain_id: checkpoint.chain_id.to_string(),
            }
        })?;
        let mut log = Self::lock(&log)?;

        let expected_from = log.checkpoints.last().map_or(0, |c| c.to_sequence + 1);
        let invalid = |reason: String| LedgerError::InvalidRange {
            chain_id: checkpoint.chain_id.to_string(),
            reason,
        };
        if log.checkpoints.iter().any(|c| c.to_sequence == checkpoint.to_sequence) {
            return Err(invalid(format!(
                "checkpoint ending at {} is already published",
                checkpoint.to_sequence
            )));
        }
        if checkpoint.from_sequence != expected_from || checkpoint.to_sequence < checkpoint.from_sequence {
            return Err(invalid(format!(
                "checkpoint {}..={} does not start at {}",
                checkpoint.from_sequence, checkpoint.to_sequence, expected_from
            )));
        }
        let committed = log.head().map(|h| h.sequence);
        if committed.map_or(true, |h| checkpoint.to_sequence > h) {
            return Err(invalid(format!(
                "checkpoint ends at {} beyond the committed head",
                checkpoint.to_sequence
            )));
        }

        debug!(
            chain_id = %checkpoint.chain_id,
            from = checkpoint.from_sequence,
            to = checkpoint.to_sequence,
            "checkpoint stored"
        );
        log.checkpoints.push(checkpoint);
        Ok(())
    }

    fn checkpoints(&self, chain_id: &ChainId) -> LedgerResult<Vec<Checkpoint>> {
        self.read(chain_id, Vec::new(), |log| log.checkpoints.clone())
    }
}

// ── Record store ──────────────────────────────────────────────────────────────

/// A business record plus its `auditHash` back-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub record: LedgerRecord,
    pub audit_hash: Option<Digest>,
}

/// A mutable document store standing in for the platform database.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<ResourceRef, StoredRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, keyed by its own resource reference.
    ///
    /// Fails if a record already lives under that key.
    pub fn insert(&self, record: LedgerRecord) -> LedgerResult<ResourceRef> {
        let resource = record.resource();
        let mut records = self.records.write().map_err(|_| poisoned("record store"))?;
        if records.contains_key(&resource) {
            return Err(LedgerError::Store {
                reason: format!("record {resource} already exists"),
            });
        }
        records.insert(
            resource.clone(),
            StoredRecord {
                record,
                audit_hash: None,
            },
        );
        Ok(resource)
    }

    /// Overwrite the record at `resource`, keeping its audit hash.
    ///
    /// This models an out-of-band edit of the platform database.
    pub fn replace(&self, resource: &ResourceRef, record: LedgerRecord) -> LedgerResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned("record store"))?;
        let stored = records.get_mut(resource).ok_or_else(|| LedgerError::NotFound {
            what: format!("record {resource}"),
        })?;
        stored.record = record;
        Ok(())
    }

    /// Delete the record at `resource`.
    pub fn remove(&self, resource: &ResourceRef) -> LedgerResult<Option<StoredRecord>> {
        let mut records = self.records.write().map_err(|_| poisoned("record store"))?;
        Ok(records.remove(resource))
    }

    pub fn get(&self, resource: &ResourceRef) -> LedgerResult<Option<StoredRecord>> {
        let records = self.records.read().map_err(|_| poisoned("record store"))?;
        Ok(records.get(resource).cloned())
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, resource: &ResourceRef) -> LedgerResult<Option<LedgerRecord>> {
        Ok(self.get(resource)?.map(|s| s.record))
    }

    fn audit_hash(&self, resource: &ResourceRef) -> LedgerResult<Option<Digest>> {
        Ok(self.get(resource)?.and_then(|s| s.audit_hash))
    }

    fn attach_audit_hash(&self, resource: &ResourceRef, digest: Digest) -> LedgerResult<()> {
        let mut records = self.records.write().map_err(|_| poisoned("record store"))?;
        let stored = records.get_mut(resource).ok_or_else(|| LedgerError::NotFound {
            what: format!("record {resource}"),
        })?;
        match stored.audit_hash {
            Some(existing) if existing == digest => Ok(()),
            Some(_) => Err(LedgerError::AuditHashAlreadySet {
                resource: resource.to_string(),
            }),
            None => {
                stored.audit_hash = Some(digest);
                Ok(())
            }
        }
    }
}
