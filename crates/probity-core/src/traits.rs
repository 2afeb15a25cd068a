//! Trust-boundary traits for the ledger.
//!
//! Both stores are external collaborators and are NOT trusted:
//!
//! - `LedgerStore` : persistence for entries, heads, and checkpoints
//! - `RecordStore` : the platform's system of record for business documents
//!
//! Nothing read from either is believed without recomputation.  The only
//! guarantee demanded of `LedgerStore` is the atomic compare-and-swap on the
//! chain head in `append`; everything else is plain key/sequence storage.

use probity_contracts::{
    digest::Digest,
    entry::{ChainHead, Checkpoint, LedgerEntry},
    error::LedgerResult,
    ids::{ChainId, ResourceRef},
    record::LedgerRecord,
};

/// Append-only persistence for chains.
///
/// Layout: entries keyed by `(chain_id, sequence)`, one head per `chain_id`,
/// checkpoints keyed by `(chain_id, to_sequence)`.
pub trait LedgerStore: Send + Sync {
    /// The committed head of `chain_id`, or `None` if nothing was ever appended.
    fn head(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainHead>>;

    /// Commit `entry` if and only if the chain head still equals `expected_head`.
    ///
    /// On success the head becomes `(entry.sequence, entry.digest)` in the same
    /// atomic step.  When the head has moved, returns
    /// `LedgerError::ChainConflict` and commits nothing.  An entry whose
    /// `(chain_id, sequence)` already exists is always rejected.
    fn append(&self, entry: LedgerEntry, expected_head: Option<ChainHead>) -> LedgerResult<ChainHead>;

    /// The entry at `sequence`, if stored.
    fn entry(&self, chain_id: &ChainId, sequence: u64) -> LedgerResult<Option<LedgerEntry>>;

    /// Stored entries with `from..=to` sequences, in ascending order.
    ///
    /// Missing sequences are simply absent from the result; detecting the gap
    /// is the verifier's job.
    fn entries(&self, chain_id: &ChainId, from: u64, to: u64) -> LedgerResult<Vec<LedgerEntry>>;

    /// The entry whose `digest` equals `digest`.
    fn find_by_digest(&self, chain_id: &ChainId, digest: &Digest) -> LedgerResult<Option<LedgerEntry>>;

    /// Publish a checkpoint.
    ///
    /// Rejects a checkpoint that does not start right after the latest one
    /// (or at 0) and any attempt to replace an existing checkpoint.
    fn put_checkpoint(&self, checkpoint: Checkpoint) -> LedgerResult<()>;

    /// All checkpoints of `chain_id`, ordered by `to_sequence`.
    fn checkpoints(&self, chain_id: &ChainId) -> LedgerResult<Vec<Checkpoint>>;

    fn latest_checkpoint(&self, chain_id: &ChainId) -> LedgerResult<Option<Checkpoint>> {
        Ok(self.checkpoints(chain_id)?.pop())
    }
}

/// The platform's store of business records.
///
/// This is the source of truth for payloads; the ledger only keeps their
/// digests.  Each record also carries the `auditHash` back-reference, which
/// is written once and never rewritten.
pub trait RecordStore: Send + Sync {
    /// The current stored version of the record at `resource`.
    fn load(&self, resource: &ResourceRef) -> LedgerResult<Option<LedgerRecord>>;

    /// The entry digest previously attached to the record, if any.
    fn audit_hash(&self, resource: &ResourceRef) -> LedgerResult<Option<Digest>>;

    /// Attach the entry digest to the record.
    ///
    /// Attaching the same digest again is a no-op; attaching a different one
    /// fails with `LedgerError::AuditHashAlreadySet`.
    fn attach_audit_hash(&self, resource: &ResourceRef, digest: Digest) -> LedgerResult<()>;
}
