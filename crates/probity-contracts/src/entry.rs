//! Chain entries, heads, and checkpoints.
//!
//! `LedgerEntry` is one link in an organization's chain.  `ChainHead` is the
//! versioned pointer the store compares-and-swaps on every append.
//! `Checkpoint` folds a contiguous range of entry digests into one root that
//! can be published outside the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    digest::Digest,
    ids::{ActorId, ChainId, ResourceRef, ResourceType},
    record::LedgerRecord,
};

/// What happened, as recorded in the entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    TransactionRecorded,
    InventoryStatusChanged,
    AdminAction,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::TransactionRecorded => "transaction_recorded",
            LedgerAction::InventoryStatusChanged => "inventory_status_changed",
            LedgerAction::AdminAction => "admin_action",
        }
    }

    /// The action that naturally describes `record`.
    pub fn for_record(record: &LedgerRecord) -> Self {
        match record {
            LedgerRecord::Transaction(_) => LedgerAction::TransactionRecorded,
            LedgerRecord::Inventory(_) => LedgerAction::InventoryStatusChanged,
            LedgerRecord::Admin(_) => LedgerAction::AdminAction,
        }
    }

    /// The only resource type an entry with this action may reference.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            LedgerAction::TransactionRecorded => ResourceType::Transaction,
            LedgerAction::InventoryStatusChanged => ResourceType::InventoryChange,
            LedgerAction::AdminAction => ResourceType::AuditLog,
        }
    }

    pub fn describes(&self, record: &LedgerRecord) -> bool {
        self.resource_type() == record.resource().resource_type
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single link in an organization's hash chain.
///
/// `digest` commits to every other field, and `prev_digest` commits to the
/// entry before it, so altering any stored entry (or the external payload
/// behind `payload_digest`) is detectable by recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub chain_id: ChainId,

    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// Commit time, truncated to whole milliseconds.
    pub timestamp: DateTime<Utc>,

    pub actor_id: ActorId,

    pub action: LedgerAction,

    /// Back-reference to the external record this entry covers.
    pub resource: ResourceRef,

    /// SHA-256 of the record's canonical bytes.
    pub payload_digest: Digest,

    /// `digest` of the previous entry, or `Digest::GENESIS` at sequence 0.
    pub prev_digest: Digest,

    pub digest: Digest,
}

impl LedgerEntry {
    pub fn head(&self) -> ChainHead {
        ChainHead {
            sequence: self.sequence,
            digest: self.digest,
        }
    }
}

/// The most recently committed `(sequence, digest)` of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub sequence: u64,
    pub digest: Digest,
}

impl ChainHead {
    /// Sequence the next appended entry must carry.
    pub fn next_sequence(&self) -> Option<u64> {
        self.sequence.checked_add(1)
    }
}

/// A published digest over entries `from_sequence..=to_sequence`.
///
/// Checkpoints of one chain are contiguous and never overlap: each starts one
/// past the previous checkpoint's `to_sequence`, the first at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub chain_id: ChainId,
    pub from_sequence: u64,
    pub to_sequence: u64,
    pub root_digest: Digest,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Number of entries folded into this checkpoint.
    pub fn entry_count(&self) -> u64 {
        self.to_sequence - self.from_sequence + 1
    }
}
