//! Verification outcomes.
//!
//! A `VerificationResult` is data, not an error: a failed verification is a
//! normal answer to "is this range intact?".  Callers that must stop on
//! tampering convert it with `into_result()`, which yields
//! `LedgerError::TamperDetected` carrying the exact divergence point.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    digest::Digest,
    entry::{ChainHead, Checkpoint},
    error::{LedgerError, LedgerResult},
    ids::ChainId,
};

/// Why an entry failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// The entry does not link to the digest before it.
    PrevDigestMismatch { expected: Digest, found: Digest },
    /// The external record behind the entry no longer exists.
    PayloadMissing,
    /// The external record changed since the entry was appended.
    PayloadDigestMismatch { stored: Digest, recomputed: Digest },
    /// The stored external record can no longer be canonicalized.
    Uncanonicalizable { reason: String },
    /// The entry's own fields do not hash to its stored digest.
    DigestMismatch { stored: Digest, recomputed: Digest },
    /// An entry is missing or out of order.
    SequenceGap { expected: u64, found: Option<u64> },
    /// An entry from another chain was returned for this one.
    ChainMismatch { found: ChainId },
    /// A checkpoint's root no longer matches the entries it covers.
    CheckpointRootMismatch { stored: Digest, recomputed: Digest },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::PrevDigestMismatch { expected, found } => write!(
                f,
                "prev_digest {} does not link to preceding digest {}",
                found.short(),
                expected.short()
            ),
            Divergence::PayloadMissing => f.write_str("external record is missing"),
            Divergence::PayloadDigestMismatch { stored, recomputed } => write!(
                f,
                "external record changed: payload digest {} recomputes to {}",
                stored.short(),
                recomputed.short()
            ),
            Divergence::Uncanonicalizable { reason } => {
                write!(f, "external record cannot be canonicalized: {reason}")
            }
            Divergence::DigestMismatch { stored, recomputed } => write!(
                f,
                "entry digest {} recomputes to {}",
                stored.short(),
                recomputed.short()
            ),
            Divergence::SequenceGap { expected, found: Some(found) } => {
                write!(f, "expected sequence {expected}, found {found}")
            }
            Divergence::SequenceGap { expected, found: None } => {
                write!(f, "entry {expected} is missing")
            }
            Divergence::ChainMismatch { found } => {
                write!(f, "entry belongs to chain '{found}'")
            }
            Divergence::CheckpointRootMismatch { stored, recomputed } => write!(
                f,
                "checkpoint root {} recomputes to {}",
                stored.short(),
                recomputed.short()
            ),
        }
    }
}

/// The outcome of verifying `from_sequence..=to_sequence` of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub chain_id: ChainId,
    pub from_sequence: u64,
    pub to_sequence: u64,

    /// `true` when every entry in the range verified.
    pub ok: bool,

    /// Sequence of the first entry that failed, if any.
    pub first_divergence: Option<u64>,

    /// What went wrong at `first_divergence`.
    pub divergence: Option<Divergence>,

    /// Entries that verified before the run stopped.
    pub entries_verified: u64,
}

impl VerificationResult {
    pub fn valid(chain_id: ChainId, from_sequence: u64, to_sequence: u64, entries_verified: u64) -> Self {
        Self {
            chain_id,
            from_sequence,
            to_sequence,
            ok: true,
            first_divergence: None,
            divergence: None,
            entries_verified,
        }
    }

    pub fn diverged(
        chain_id: ChainId,
        from_sequence: u64,
        to_sequence: u64,
        sequence: u64,
        divergence: Divergence,
        entries_verified: u64,
    ) -> Self {
        Self {
            chain_id,
            from_sequence,
            to_sequence,
            ok: false,
            first_divergence: Some(sequence),
            divergence: Some(divergence),
            entries_verified,
        }
    }

    /// Turn a failed result into `LedgerError::TamperDetected`.
    pub fn into_result(self) -> LedgerResult<Self> {
        match (self.ok, self.first_divergence) {
            (false, Some(sequence)) => Err(LedgerError::TamperDetected {
                chain_id: self.chain_id.to_string(),
                sequence,
                reason: self
                    .divergence
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "verification failed".to_string()),
            }),
            _ => Ok(self),
        }
    }
}

/// The outcome of checking one donor receipt against the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// The record's audit hash is on the chain and the chain verifies through it.
    Valid { sequence: u64, digest: Digest },
    /// The record carries no audit hash.
    NotRecorded,
    /// The audit hash is unknown to the chain, or the chain fails before it.
    Invalid { sequence: Option<u64>, reason: String },
}

/// Public summary of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub chain_id: ChainId,
    pub head: Option<ChainHead>,
    pub entry_count: u64,
    pub last_checkpoint: Option<Checkpoint>,
}
