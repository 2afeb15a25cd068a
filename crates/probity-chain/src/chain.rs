//! Hash-chain primitives: payload, entry, and checkpoint digests.
//!
//! Every field that contributes to a digest is listed explicitly so nothing
//! is accidentally omitted.  Variable-length fields are length-prefixed
//! (u32 little-endian) so that no two distinct headers share an input.
//!
//! Entry digest input layout (bytes, in order):
//!   1. prev_digest (32 bytes)
//!   2. payload_digest (32 bytes)
//!   3. sequence as 8-byte little-endian
//!   4. timestamp as epoch milliseconds, 8-byte little-endian
//!   5. chain_id, actor_id, action, resource type, resource id (each
//!      length-prefixed UTF-8)
//!
//! Checkpoint root input layout:
//!   1. chain_id (length-prefixed)
//!   2. from_sequence, to_sequence as 8-byte little-endian
//!   3. every entry digest in the range, in sequence order

use sha2::{Digest as _, Sha256};

use probity_contracts::{
    digest::Digest,
    entry::LedgerEntry,
    ids::ChainId,
    verify::Divergence,
};

fn finish(hasher: Sha256) -> Digest {
    Digest(hasher.finalize().into())
}

fn update_field(hasher: &mut Sha256, field: &str) {
    let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
    hasher.update(len.to_le_bytes());
    hasher.update(field.as_bytes());
}

/// SHA-256 of a record's canonical bytes.
pub fn payload_digest(canonical_bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes);
    finish(hasher)
}

/// Compute the digest `entry` must carry.
///
/// Reads every field of `entry` except `digest` itself, so it serves both
/// to seal a new entry and to re-check a stored one.
pub fn entry_digest(entry: &LedgerEntry) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(entry.prev_digest.as_bytes());
    hasher.update(entry.payload_digest.as_bytes());
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.timestamp.timestamp_millis().to_le_bytes());
    update_field(&mut hasher, entry.chain_id.as_str());
    update_field(&mut hasher, entry.actor_id.as_str());
    update_field(&mut hasher, entry.action.as_str());
    update_field(&mut hasher, entry.resource.resource_type.as_str());
    update_field(&mut hasher, &entry.resource.resource_id);
    finish(hasher)
}

/// Fold the ordered digests of `from..=to` into a checkpoint root.
pub fn checkpoint_root(chain_id: &ChainId, from: u64, to: u64, digests: &[Digest]) -> Digest {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, chain_id.as_str());
    hasher.update(from.to_le_bytes());
    hasher.update(to.to_le_bytes());
    for digest in digests {
        hasher.update(digest.as_bytes());
    }
    finish(hasher)
}

/// Structural checks on one stored entry, independent of its payload.
///
/// Checks, in order: position (`expected_sequence`), chain membership,
/// linkage to `expected_prev`, and the entry digest recomputation.
pub fn check_link(
    entry: &LedgerEntry,
    chain_id: &ChainId,
    expected_sequence: u64,
    expected_prev: &Digest,
) -> Result<(), Divergence> {
    if entry.sequence != expected_sequence {
        return Err(Divergence::SequenceGap {
            expected: expected_sequence,
            found: Some(entry.sequence),
        });
    }
    if &entry.chain_id != chain_id {
        return Err(Divergence::ChainMismatch {
            found: entry.chain_id.clone(),
        });
    }
    if &entry.prev_digest != expected_prev {
        return Err(Divergence::PrevDigestMismatch {
            expected: *expected_prev,
            found: entry.prev_digest,
        });
    }
    let recomputed = entry_digest(entry);
    if recomputed != entry.digest {
        return Err(Divergence::DigestMismatch {
            stored: entry.digest,
            recomputed,
        });
    }
    Ok(())
}
