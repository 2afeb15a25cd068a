//! Simulated NGO platform data for the Probity reference runtime.
//!
//! All data in this module is hardcoded and fictional.  The organization is
//! "Asha Seva Trust", running a flood-relief campaign; its donations,
//! inventory movements, and admin actions stand in for the platform's
//! transaction, inventory, and audit-log collections.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use probity_contracts::{
    error::{CanonicalizationError, LedgerResult},
    ids::{ActorId, ChainId},
    record::{
        AdminActionKind, AdminActionRecord, DecimalAmount, DistributionRecord, InventoryChange,
        InventoryStatus, LedgerRecord, TransactionKind, TransactionRecord, TransactionStatus,
    },
};

pub const ORGANIZATION: &str = "asha-seva-trust";
pub const CAMPAIGN: &str = "flood-relief-2026";

/// The organization's chain; one chain per organization.
pub fn chain_id() -> ChainId {
    ChainId::new(ORGANIZATION)
}

pub fn treasurer() -> ActorId {
    ActorId::new("user-treasurer-meera")
}

pub fn administrator() -> ActorId {
    ActorId::new("user-admin-rahul")
}

pub fn field_officer() -> ActorId {
    ActorId::new("user-field-anil")
}

/// Who on staff makes each kind of record.
pub fn actor_for(record: &LedgerRecord) -> ActorId {
    match record {
        LedgerRecord::Transaction(_) => treasurer(),
        LedgerRecord::Inventory(_) => field_officer(),
        LedgerRecord::Admin(_) => administrator(),
    }
}

/// `hour`:00 UTC on `day` March 2026.
fn march(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

// ── Transactions ──────────────────────────────────────────────────────────────

/// A completed online INR donation to the flood-relief campaign.
pub fn donation(transaction_id: &str, donor_id: &str, amount: &str) -> LedgerRecord {
    LedgerRecord::Transaction(TransactionRecord {
        transaction_id: transaction_id.to_string(),
        donor_id: Some(donor_id.to_string()),
        kind: TransactionKind::Financial,
        amount: DecimalAmount::new(amount),
        currency: "INR".to_string(),
        in_kind_items: Vec::new(),
        payment_provider: Some("razorpay".to_string()),
        payment_ref: Some(format!("pay_{transaction_id}")),
        campaign_id: Some(CAMPAIGN.to_string()),
        status: TransactionStatus::Completed,
        created_at: march(2, 10),
        receipt_id: None,
    })
}

/// The platform document for an in-kind donation, as the API receives it.
///
/// Amounts arrive as JSON numbers here; the ledger accepts either form.
pub fn in_kind_document() -> Value {
    json!({
        "transaction_id": "txn-inkind-0041",
        "donor_id": "donor-kavya",
        "kind": "in-kind",
        "amount": 18500.5,
        "currency": "INR",
        "in_kind_items": [
            { "description": "Blankets (40)", "estimated_value": 12000 },
            {
                "description": "Water purification tablets (500)",
                "estimated_value": "6500.50",
                "image_url": "https://example.org/items/tablets.jpg"
            }
        ],
        "campaign_id": CAMPAIGN,
        "status": "completed",
        "created_at": "2026-03-03T08:15:00Z"
    })
}

/// `in_kind_document`, parsed into a ledger record.
pub fn in_kind_donation() -> LedgerResult<LedgerRecord> {
    let record: TransactionRecord =
        serde_json::from_value(in_kind_document()).map_err(|e| CanonicalizationError::Malformed {
            reason: format!("in-kind document: {e}"),
        })?;
    Ok(LedgerRecord::Transaction(record))
}

// ── Inventory ─────────────────────────────────────────────────────────────────

/// Blankets from the in-kind donation handed to a relief camp beneficiary.
pub fn blankets_distributed() -> LedgerRecord {
    LedgerRecord::Inventory(InventoryChange {
        change_id: "invchg-0007".to_string(),
        item_id: "item-blankets-40".to_string(),
        previous_status: Some(InventoryStatus::Available),
        status: InventoryStatus::Distributed,
        estimated_value: Some(DecimalAmount::new("12000")),
        currency: "INR".to_string(),
        distribution: Some(DistributionRecord {
            to_beneficiary_id: "beneficiary-camp-3".to_string(),
            date: march(5, 14),
            proof_url: Some("https://example.org/proof/invchg-0007.jpg".to_string()),
        }),
        changed_at: march(5, 15),
    })
}

// ── Audit log ─────────────────────────────────────────────────────────────────

pub fn campaign_created() -> LedgerRecord {
    LedgerRecord::Admin(AdminActionRecord {
        log_id: "audit-0001".to_string(),
        action: AdminActionKind::CampaignCreated {
            campaign_id: CAMPAIGN.to_string(),
            title: "Assam Flood Relief 2026".to_string(),
            goal: DecimalAmount::new("500000"),
            currency: "INR".to_string(),
        },
        performed_at: march(1, 9),
    })
}

pub fn receipt_issued(log_id: &str, receipt_id: &str, transaction_id: &str) -> LedgerRecord {
    LedgerRecord::Admin(AdminActionRecord {
        log_id: log_id.to_string(),
        action: AdminActionKind::ReceiptIssued {
            receipt_id: receipt_id.to_string(),
            transaction_id: transaction_id.to_string(),
            verification_url: Some(format!("https://example.org/receipts/{receipt_id}/verify")),
        },
        performed_at: march(2, 11),
    })
}

pub fn volunteer_promoted() -> LedgerRecord {
    LedgerRecord::Admin(AdminActionRecord {
        log_id: "audit-0002".to_string(),
        action: AdminActionKind::UserRoleChanged {
            user_id: "user-field-anil".to_string(),
            previous_role: Some("volunteer".to_string()),
            role: "field_officer".to_string(),
        },
        performed_at: march(4, 9),
    })
}

/// The first week of the campaign, in the order the platform recorded it.
///
/// Starts with donations A, B, and C (500, 1000, and 250 INR).
pub fn opening_week() -> Vec<LedgerRecord> {
    vec![
        donation("txn-A", "donor-priya", "500"),
        donation("txn-B", "donor-arjun", "1000"),
        donation("txn-C", "donor-sana", "250"),
        campaign_created(),
        receipt_issued("audit-0003", "rcpt-0001", "txn-A"),
        volunteer_promoted(),
        blankets_distributed(),
    ]
}
