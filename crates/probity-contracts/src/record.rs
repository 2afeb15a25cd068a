//! Business records covered by the ledger.
//!
//! These mirror the platform's transaction, inventory, and audit-log
//! documents.  The ledger never stores them: it canonicalizes them at append
//! time and re-reads them from the external store at verification time.
//! Status and action fields are closed enums so that every kind has exactly
//! one canonical encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::{ResourceRef, ResourceType};

fn default_currency() -> String {
    "INR".to_string()
}

// ── Decimal amounts ───────────────────────────────────────────────────────────

/// A monetary amount exactly as the external store holds it.
///
/// The store may hold `500`, `500.5`, or `"500.50"`; the text is kept verbatim
/// and only converted to integer minor units by the canonicalizer, which
/// knows the currency's exponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount(String);

impl DecimalAmount {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for DecimalAmount {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for DecimalAmount {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for DecimalAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DecimalAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Self(n.to_string()),
            Repr::Text(s) => Self(s),
        })
    }
}

// ── Transactions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Financial,
    InKind,
    Service,
    Product,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Financial => "financial",
            TransactionKind::InKind => "in-kind",
            TransactionKind::Service => "service",
            TransactionKind::Product => "product",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

/// One donated item in an in-kind transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InKindItem {
    pub description: String,
    pub estimated_value: DecimalAmount,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A donation transaction as stored by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    #[serde(default)]
    pub donor_id: Option<String>,
    pub kind: TransactionKind,
    pub amount: DecimalAmount,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub in_kind_items: Vec<InKindItem>,
    #[serde(default)]
    pub payment_provider: Option<String>,
    #[serde(default)]
    pub payment_ref: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub receipt_id: Option<String>,
}

// ── Inventory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    Available,
    Distributed,
    Disposed,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Available => "available",
            InventoryStatus::Distributed => "distributed",
            InventoryStatus::Disposed => "disposed",
        }
    }
}

/// Where a distributed item went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub to_beneficiary_id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub proof_url: Option<String>,
}

/// One status movement of an in-kind inventory item.
///
/// Each change is its own external record (`change_id`) so that every
/// ledger entry covers exactly one immutable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryChange {
    pub change_id: String,
    pub item_id: String,
    #[serde(default)]
    pub previous_status: Option<InventoryStatus>,
    pub status: InventoryStatus,
    #[serde(default)]
    pub estimated_value: Option<DecimalAmount>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub distribution: Option<DistributionRecord>,
    pub changed_at: DateTime<Utc>,
}

// ── Administrative actions ────────────────────────────────────────────────────

/// Privileged actions written to the audit log, one variant per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminActionKind {
    CampaignCreated {
        campaign_id: String,
        title: String,
        goal: DecimalAmount,
        #[serde(default = "default_currency")]
        currency: String,
    },
    CampaignUpdated {
        campaign_id: String,
        changed_fields: Vec<String>,
    },
    CampaignClosed {
        campaign_id: String,
        raised: DecimalAmount,
        #[serde(default = "default_currency")]
        currency: String,
    },
    UserRoleChanged {
        user_id: String,
        #[serde(default)]
        previous_role: Option<String>,
        role: String,
    },
    ReceiptIssued {
        receipt_id: String,
        transaction_id: String,
        #[serde(default)]
        verification_url: Option<String>,
    },
    DonorProfileUpdated {
        donor_id: String,
        changed_fields: Vec<String>,
    },
}

impl AdminActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            AdminActionKind::CampaignCreated { .. } => "campaign_created",
            AdminActionKind::CampaignUpdated { .. } => "campaign_updated",
            AdminActionKind::CampaignClosed { .. } => "campaign_closed",
            AdminActionKind::UserRoleChanged { .. } => "user_role_changed",
            AdminActionKind::ReceiptIssued { .. } => "receipt_issued",
            AdminActionKind::DonorProfileUpdated { .. } => "donor_profile_updated",
        }
    }
}

/// An audit-log document recording one administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminActionRecord {
    pub log_id: String,
    pub action: AdminActionKind,
    pub performed_at: DateTime<Utc>,
}

// ── Ledger record ─────────────────────────────────────────────────────────────

/// Any record that can be bound into a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", content = "data", rename_all = "snake_case")]
pub enum LedgerRecord {
    Transaction(TransactionRecord),
    Inventory(InventoryChange),
    Admin(AdminActionRecord),
}

impl LedgerRecord {
    /// The external-store key this record lives under.
    pub fn resource(&self) -> ResourceRef {
        match self {
            LedgerRecord::Transaction(t) => {
                ResourceRef::new(ResourceType::Transaction, t.transaction_id.clone())
            }
            LedgerRecord::Inventory(c) => {
                ResourceRef::new(ResourceType::InventoryChange, c.change_id.clone())
            }
            LedgerRecord::Admin(a) => ResourceRef::new(ResourceType::AuditLog, a.log_id.clone()),
        }
    }
}
