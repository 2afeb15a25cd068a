//! The Checkpoint/Anchor service.
//!
//! A checkpoint folds the entry digests of one contiguous segment into a
//! single root.  Checkpoints partition a chain: each starts one past the
//! previous checkpoint's end (or at 0), so publishing roots at intervals pins
//! the whole history without re-hashing it.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, info};

use probity_chain::chain::checkpoint_root;
use probity_contracts::{
    digest::Digest,
    entry::Checkpoint,
    error::{LedgerError, LedgerResult},
    ids::ChainId,
    policy::CheckpointPolicy,
};
use probity_core::traits::LedgerStore;

use crate::engine::ChainVerifier;

/// Creates, schedules, and checks checkpoints.
pub struct CheckpointService {
    store: Arc<dyn LedgerStore>,
    verifier: Arc<ChainVerifier>,
    policy: CheckpointPolicy,
}

impl CheckpointService {
    pub fn new(store: Arc<dyn LedgerStore>, verifier: Arc<ChainVerifier>) -> Self {
        Self {
            store,
            verifier,
            policy: CheckpointPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CheckpointPolicy {
        &self.policy
    }

    /// Seal `last.to_sequence + 1 ..= upto` (or `0..=upto` for the first
    /// checkpoint) and publish it to the store.
    ///
    /// The segment is verified before it is sealed; a checkpoint over
    /// tampered entries would anchor the tampering.
    ///
    /// # Errors
    ///
    /// - `ChainNotInitialized` when the chain has no entries
    /// - `InvalidRange` when `upto` is already sealed
    /// - `NotFound` when `upto` is beyond the head
    /// - `TamperDetected` when the segment fails verification
    pub fn create_checkpoint(&self, chain_id: &ChainId, upto: u64) -> LedgerResult<Checkpoint> {
        let from = self
            .store
            .latest_checkpoint(chain_id)?
            .map_or(0, |c| c.to_sequence + 1);
        if upto < from {
            return Err(LedgerError::InvalidRange {
                chain_id: chain_id.to_string(),
                reason: format!("sequence {upto} is already sealed (next checkpoint starts at {from})"),
            });
        }

        debug!(chain_id = %chain_id, from, to = upto, "creating checkpoint");

        self.verifier.verify_range(chain_id, from, upto)?.into_result()?;

        let digests: Vec<Digest> = self
            .store
            .entries(chain_id, from, upto)?
            .iter()
            .map(|e| e.digest)
            .collect();
        let checkpoint = Checkpoint {
            chain_id: chain_id.clone(),
            from_sequence: from,
            to_sequence: upto,
            root_digest: checkpoint_root(chain_id, from, upto, &digests),
            created_at: Utc::now().trunc_subsecs(3),
        };
        self.store.put_checkpoint(checkpoint.clone())?;

        info!(
            chain_id = %chain_id,
            from,
            to = upto,
            entries = checkpoint.entry_count(),
            root = %checkpoint.root_digest,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// `true` when `checkpoint` still matches the chain: every entry in its
    /// range verifies and the recomputed root equals `root_digest`.
    ///
    /// The checkpoint need not come from this store; an externally published
    /// copy is checked the same way.
    pub fn verify_checkpoint(&self, checkpoint: &Checkpoint) -> LedgerResult<bool> {
        Ok(self.verifier.inspect_checkpoint(checkpoint)?.ok)
    }

    /// Seal everything past the last checkpoint once at least
    /// `interval_entries` entries have accumulated there.
    ///
    /// Returns `None` when no checkpoint is due, or when a concurrent caller
    /// sealed the same segment first.
    pub fn checkpoint_if_due(&self, chain_id: &ChainId) -> LedgerResult<Option<Checkpoint>> {
        let Some(head) = self.store.head(chain_id)? else {
            return Ok(None);
        };
        let from = self
            .store
            .latest_checkpoint(chain_id)?
            .map_or(0, |c| c.to_sequence + 1);
        if from > head.sequence {
            return Ok(None);
        }

        let pending = head.sequence - from + 1;
        if pending < self.policy.interval_entries {
            return Ok(None);
        }
        match self.create_checkpoint(chain_id, head.sequence) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            // Another caller sealed this segment first.
            Err(LedgerError::InvalidRange { reason, .. }) => {
                debug!(chain_id = %chain_id, %reason, "scheduled checkpoint already taken");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
