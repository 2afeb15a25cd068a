//! Recomputation-based chain verifier.
//!
//! `ChainVerifier` trusts nothing it reads.  For every entry in a range it:
//!
//! 1. checks the sequence is the next one expected (no gaps, no reordering)
//! 2. checks the entry belongs to the chain being verified
//! 3. checks `prev_digest` links to the digest before it (genesis at 0)
//! 4. recomputes the entry digest from the stored header
//! 5. re-reads the external record, re-canonicalizes it, and compares the
//!    payload digest
//!
//! It stops at the first failure.  Entries after a corrupted one cannot be
//! tied to a trusted digest, so continuing would only report noise.
//!
//! Verification runs against the head read when it starts; appends that
//! commit afterwards are outside the run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use probity_chain::chain::{check_link, checkpoint_root, payload_digest};
use probity_contracts::{
    digest::Digest,
    entry::{Checkpoint, LedgerEntry},
    error::{LedgerError, LedgerResult},
    ids::{ChainId, ResourceRef},
    verify::{Divergence, ReceiptStatus, VerificationResult},
};
use probity_core::{
    traits::{LedgerStore, RecordStore},
    Canonicalizer,
};

/// Verifies chains held in a `LedgerStore` against payloads in a `RecordStore`.
pub struct ChainVerifier {
    store: Arc<dyn LedgerStore>,
    records: Arc<dyn RecordStore>,
    canonicalizer: Arc<Canonicalizer>,
}

impl ChainVerifier {
    /// Create a verifier.
    ///
    /// `canonicalizer` must use the same currency table the engine appended
    /// with, or every payload digest will diverge.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        records: Arc<dyn RecordStore>,
        canonicalizer: Arc<Canonicalizer>,
    ) -> Self {
        Self {
            store,
            records,
            canonicalizer,
        }
    }

    /// Verify `from..=to` of `chain_id`.
    ///
    /// # Errors
    ///
    /// - `ChainNotInitialized` when the chain has no entries
    /// - `InvalidRange` when `from > to`
    /// - `NotFound` when `to` is beyond the head read at start
    ///
    /// A range that fails verification is NOT an error: the result carries
    /// `ok = false` and the first divergent sequence.
    pub fn verify_range(&self, chain_id: &ChainId, from: u64, to: u64) -> LedgerResult<VerificationResult> {
        let head = self
            .store
            .head(chain_id)?
            .ok_or_else(|| LedgerError::ChainNotInitialized {
                chain_id: chain_id.to_string(),
            })?;
        if from > to {
            return Err(LedgerError::InvalidRange {
                chain_id: chain_id.to_string(),
                reason: format!("from {from} is after to {to}"),
            });
        }
        if to > head.sequence {
            return Err(LedgerError::NotFound {
                what: format!("sequence {to} on chain '{chain_id}' (head is {})", head.sequence),
            });
        }

        debug!(chain_id = %chain_id, from, to, head = head.sequence, "verifying range");

        let expected_prev = if from == 0 {
            Digest::GENESIS
        } else {
            match self.store.entry(chain_id, from - 1)? {
                Some(prev) => prev.digest,
                None => {
                    let result = VerificationResult::diverged(
                        chain_id.clone(),
                        from,
                        to,
                        from - 1,
                        Divergence::SequenceGap {
                            expected: from - 1,
                            found: None,
                        },
                        0,
                    );
                    self.report(&result);
                    return Ok(result);
                }
            }
        };

        let entries = self.store.entries(chain_id, from, to)?;
        let result = self.check_entries(chain_id, from, to, expected_prev, &entries);
        self.report(&result);
        Ok(result)
    }

    /// Verify every committed entry of `chain_id`.
    ///
    /// A chain with no entries is trivially valid.
    pub fn verify_chain(&self, chain_id: &ChainId) -> LedgerResult<VerificationResult> {
        match self.store.head(chain_id)? {
            None => Ok(VerificationResult::valid(chain_id.clone(), 0, 0, 0)),
            Some(head) => self.verify_range(chain_id, 0, head.sequence),
        }
    }

    /// Recompute a checkpoint: its entries must verify and their digests
    /// must fold to `root_digest`.
    ///
    /// A checkpoint is usually held by someone outside the store, so a chain
    /// that no longer reaches `to_sequence` (truncated, or gone entirely) is
    /// a divergence at the first missing sequence, not an error.
    pub fn inspect_checkpoint(&self, checkpoint: &Checkpoint) -> LedgerResult<VerificationResult> {
        let chain_id = &checkpoint.chain_id;
        let from = checkpoint.from_sequence;
        let to = checkpoint.to_sequence;

        let missing_from = match self.store.head(chain_id)? {
            None => Some(0),
            Some(head) if head.sequence < to => Some(head.sequence + 1),
            Some(_) => None,
        };
        if let Some(missing) = missing_from {
            // Entries that do exist are still checked so an earlier edit is
            // reported where it happened.
            if missing > from {
                let present = self.verify_range(chain_id, from, missing - 1)?;
                if !present.ok {
                    return Ok(VerificationResult { to_sequence: to, ..present });
                }
            }
            let verified = missing.saturating_sub(from);
            let result = VerificationResult::diverged(
                chain_id.clone(),
                from,
                to,
                missing.max(from),
                Divergence::SequenceGap {
                    expected: missing.max(from),
                    found: None,
                },
                verified,
            );
            self.report(&result);
            return Ok(result);
        }

        let result = self.verify_range(chain_id, from, to)?;
        if !result.ok {
            return Ok(result);
        }

        let digests: Vec<Digest> = self
            .store
            .entries(chain_id, from, to)?
            .iter()
            .map(|e| e.digest)
            .collect();
        let recomputed = checkpoint_root(chain_id, from, to, &digests);
        if recomputed != checkpoint.root_digest {
            let result = VerificationResult::diverged(
                chain_id.clone(),
                from,
                to,
                from,
                Divergence::CheckpointRootMismatch {
                    stored: checkpoint.root_digest,
                    recomputed,
                },
                result.entries_verified,
            );
            self.report(&result);
            return Ok(result);
        }
        Ok(result)
    }

    /// Verify `checkpoint.to_sequence + 1 ..= to`, anchored on `checkpoint`.
    ///
    /// The checkpoint itself is re-inspected first; once it holds, the digest
    /// at its last sequence is the trusted link for the rest of the run.
    pub fn verify_from_checkpoint(&self, checkpoint: &Checkpoint, to: u64) -> LedgerResult<VerificationResult> {
        let chain_id = &checkpoint.chain_id;
        let anchor = self.inspect_checkpoint(checkpoint)?;
        if !anchor.ok || to <= checkpoint.to_sequence {
            return Ok(anchor);
        }

        let from = checkpoint.to_sequence + 1;
        let tail = self.verify_range(chain_id, from, to)?;
        Ok(VerificationResult {
            from_sequence: checkpoint.from_sequence,
            entries_verified: anchor.entries_verified + tail.entries_verified,
            ..tail
        })
    }

    /// Verify a whole chain segment by segment: each published checkpoint,
    /// then the unsealed tail after the last one.
    pub fn verify_segments(&self, chain_id: &ChainId) -> LedgerResult<VerificationResult> {
        let head = match self.store.head(chain_id)? {
            None => return Ok(VerificationResult::valid(chain_id.clone(), 0, 0, 0)),
            Some(head) => head,
        };

        let mut verified = 0;
        let mut next = 0;
        for checkpoint in self.store.checkpoints(chain_id)? {
            let result = self.inspect_checkpoint(&checkpoint)?;
            verified += result.entries_verified;
            if !result.ok {
                return Ok(VerificationResult {
                    from_sequence: 0,
                    to_sequence: head.sequence,
                    entries_verified: verified,
                    ..result
                });
            }
            next = checkpoint.to_sequence + 1;
        }

        if next > head.sequence {
            return Ok(VerificationResult::valid(chain_id.clone(), 0, head.sequence, verified));
        }
        let tail = self.verify_range(chain_id, next, head.sequence)?;
        Ok(VerificationResult {
            from_sequence: 0,
            entries_verified: verified + tail.entries_verified,
            ..tail
        })
    }

    /// Check one donor receipt: the record's audit hash must name an entry
    /// for that record, and the chain must verify through that entry.
    ///
    /// Verification starts at the last checkpoint sealed before the entry,
    /// or at 0 when there is none.
    pub fn verify_receipt(&self, chain_id: &ChainId, resource: &ResourceRef) -> LedgerResult<ReceiptStatus> {
        let Some(audit_hash) = self.records.audit_hash(resource)? else {
            return Ok(ReceiptStatus::NotRecorded);
        };
        let Some(entry) = self.store.find_by_digest(chain_id, &audit_hash)? else {
            warn!(chain_id = %chain_id, resource = %resource, "audit hash is not on the chain");
            return Ok(ReceiptStatus::Invalid {
                sequence: None,
                reason: format!("audit hash {} is not on chain '{chain_id}'", audit_hash.short()),
            });
        };
        if &entry.resource != resource {
            return Ok(ReceiptStatus::Invalid {
                sequence: Some(entry.sequence),
                reason: format!("audit hash belongs to {}", entry.resource),
            });
        }

        let anchor = self
            .store
            .checkpoints(chain_id)?
            .into_iter()
            .filter(|c| c.to_sequence < entry.sequence)
            .last();
        let result = match anchor {
            Some(checkpoint) => self.verify_from_checkpoint(&checkpoint, entry.sequence)?,
            None => self.verify_range(chain_id, 0, entry.sequence)?,
        };

        Ok(match (result.ok, result.divergence) {
            (true, _) => ReceiptStatus::Valid {
                sequence: entry.sequence,
                digest: entry.digest,
            },
            (false, divergence) => ReceiptStatus::Invalid {
                sequence: result.first_divergence,
                reason: divergence
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "verification failed".to_string()),
            },
        })
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Walk `entries` expecting exactly `from..=to`, linked from `expected_prev`.
    fn check_entries(
        &self,
        chain_id: &ChainId,
        from: u64,
        to: u64,
        mut expected_prev: Digest,
        entries: &[LedgerEntry],
    ) -> VerificationResult {
        let mut stored = entries.iter();
        let mut verified = 0;

        for sequence in from..=to {
            let outcome = match stored.next() {
                None => Err(Divergence::SequenceGap {
                    expected: sequence,
                    found: None,
                }),
                Some(entry) => check_link(entry, chain_id, sequence, &expected_prev)
                    .and_then(|()| self.check_payload(entry))
                    .map(|()| entry.digest),
            };

            match outcome {
                Ok(digest) => {
                    expected_prev = digest;
                    verified += 1;
                }
                Err(divergence) => {
                    return VerificationResult::diverged(
                        chain_id.clone(),
                        from,
                        to,
                        sequence,
                        divergence,
                        verified,
                    );
                }
            }
        }

        VerificationResult::valid(chain_id.clone(), from, to, verified)
    }

    /// Re-derive the payload digest from the external record.
    fn check_payload(&self, entry: &LedgerEntry) -> Result<(), Divergence> {
        let record = match self.records.load(&entry.resource) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Divergence::PayloadMissing),
            Err(e) => {
                return Err(Divergence::Uncanonicalizable {
                    reason: format!("record store failed: {e}"),
                })
            }
        };

        let bytes = self
            .canonicalizer
            .canonicalize(&record)
            .map_err(|e| Divergence::Uncanonicalizable { reason: e.to_string() })?;
        let recomputed = payload_digest(&bytes);
        if recomputed != entry.payload_digest {
            return Err(Divergence::PayloadDigestMismatch {
                stored: entry.payload_digest,
                recomputed,
            });
        }
        Ok(())
    }

    fn report(&self, result: &VerificationResult) {
        match (&result.first_divergence, &result.divergence) {
            (Some(sequence), Some(divergence)) => warn!(
                chain_id = %result.chain_id,
                sequence,
                %divergence,
                "chain divergence detected"
            ),
            _ => info!(
                chain_id = %result.chain_id,
                from = result.from_sequence,
                to = result.to_sequence,
                entries = result.entries_verified,
                "range verified"
            ),
        }
    }
}
