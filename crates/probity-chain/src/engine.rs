//! The hash chain engine: the single-writer append protocol.
//!
//! An append is:
//!
//!   check action ↔ record → canonicalize → read head → seal entry → CAS commit
//!
//! Everything before the commit is pure, so an append that fails or is
//! abandoned before `LedgerStore::append` returns leaves no trace.  The
//! commit itself is the store's atomic compare-and-swap on the head; a lost
//! race surfaces as `LedgerError::ChainConflict` and nothing is written.

use std::{sync::Arc, thread};

use chrono::{SubsecRound, Utc};
use tracing::{debug, info, warn};

use probity_contracts::{
    digest::Digest,
    entry::{ChainHead, LedgerAction, LedgerEntry},
    error::{LedgerError, LedgerResult},
    ids::{ActorId, ChainId},
    policy::RetryPolicy,
    record::LedgerRecord,
};
use probity_core::{traits::LedgerStore, Canonicalizer};

use crate::chain::{entry_digest, payload_digest};

/// Appends records to per-organization chains.
///
/// The engine holds no chain state of its own: the head lives behind the
/// store's compare-and-swap, so any number of engines (or threads sharing
/// one) may append concurrently.  Appends to different chains never contend.
pub struct HashChainEngine {
    store: Arc<dyn LedgerStore>,
    canonicalizer: Arc<Canonicalizer>,
    retry: RetryPolicy,
}

impl HashChainEngine {
    pub fn new(store: Arc<dyn LedgerStore>, canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            store,
            canonicalizer,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// The committed head of `chain_id`, or `None` while uninitialized.
    pub fn head(&self, chain_id: &ChainId) -> LedgerResult<Option<ChainHead>> {
        self.store.head(chain_id)
    }

    /// Append one record to `chain_id`, attempting the commit exactly once.
    ///
    /// The first append to a chain takes sequence 0 and links to
    /// `Digest::GENESIS`.
    ///
    /// # Errors
    ///
    /// - `ActionMismatch` / `Canonicalization`: rejected before reading the head
    /// - `ChainConflict`: another append committed first; re-read and retry
    /// - anything the store reports
    pub fn append(
        &self,
        chain_id: &ChainId,
        record: &LedgerRecord,
        actor_id: &ActorId,
        action: LedgerAction,
    ) -> LedgerResult<LedgerEntry> {
        let resource = record.resource();
        if !action.describes(record) {
            return Err(LedgerError::ActionMismatch {
                action: action.to_string(),
                resource_type: resource.resource_type.to_string(),
            });
        }

        let canonical = self.canonicalizer.canonicalize(record)?;
        let payload_digest = payload_digest(&canonical);

        let head = self.store.head(chain_id)?;
        let (sequence, prev_digest) = match head {
            None => (0, Digest::GENESIS),
            Some(h) => (
                h.next_sequence().ok_or_else(|| LedgerError::InvalidRange {
                    chain_id: chain_id.to_string(),
                    reason: "sequence space exhausted".to_string(),
                })?,
                h.digest,
            ),
        };

        debug!(
            chain_id = %chain_id,
            sequence,
            resource = %resource,
            action = %action,
            "sealing ledger entry"
        );

        let mut entry = LedgerEntry {
            chain_id: chain_id.clone(),
            sequence,
            timestamp: Utc::now().trunc_subsecs(3),
            actor_id: actor_id.clone(),
            action,
            resource,
            payload_digest,
            prev_digest,
            digest: Digest::GENESIS,
        };
        entry.digest = entry_digest(&entry);

        self.store.append(entry.clone(), head)?;

        info!(
            chain_id = %chain_id,
            sequence,
            digest = %entry.digest,
            resource = %entry.resource,
            "ledger entry committed"
        );

        Ok(entry)
    }

    /// `append` with bounded retry on `ChainConflict`.
    ///
    /// Each retry re-reads the head.  Backoff between attempts follows the
    /// engine's `RetryPolicy`; any error other than a conflict is returned
    /// immediately, as is the last conflict once attempts run out.
    pub fn append_with_retry(
        &self,
        chain_id: &ChainId,
        record: &LedgerRecord,
        actor_id: &ActorId,
        action: LedgerAction,
    ) -> LedgerResult<LedgerEntry> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.append(chain_id, record, actor_id, action) {
                Err(LedgerError::ChainConflict { attempted, .. }) if attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        chain_id = %chain_id,
                        attempted,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "chain head moved during append; retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
