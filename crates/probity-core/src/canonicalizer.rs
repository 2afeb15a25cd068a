//! The canonicalizer: records in, canonical bytes out.
//!
//! Normalization rules applied while building the canonical value:
//!
//! - amounts become integer minor units using the currency's exponent
//!   (`"500.5"` INR → `50050`); trailing zero digits beyond the exponent are
//!   accepted, significant ones are rejected
//! - currency codes are trimmed and upper-cased and must be configured
//! - timestamps become epoch milliseconds
//! - optional fields are always present, as `Absent` when unset
//! - every document carries a `record` discriminator and schema version
//!
//! Any violation fails the whole record with `CanonicalizationError`; there is
//! no partial output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use probity_contracts::{
    error::CanonicalizationError,
    record::{
        AdminActionKind, AdminActionRecord, DecimalAmount, DistributionRecord, InKindItem,
        InventoryChange, LedgerRecord, TransactionRecord,
    },
};

use crate::canonical::{encode, CanonicalMap, CanonicalValue};

/// Version stamped into every canonical document.
pub const CANONICAL_VERSION: i64 = 1;

/// Largest accepted minor-unit exponent.
pub const MAX_EXPONENT: u8 = 6;

/// A record type with a canonical form.
pub trait Canonicalize {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError>;
}

/// Deterministic serializer for ledger records.
///
/// Holds the currency → minor-unit exponent table.  Two canonicalizers with
/// the same table produce identical bytes for the same logical record, so
/// the table must stay fixed for the lifetime of a chain.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    currencies: BTreeMap<String, u8>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        let currencies = [("INR", 2), ("USD", 2), ("EUR", 2), ("GBP", 2), ("JPY", 0)]
            .into_iter()
            .map(|(code, exp)| (code.to_string(), exp))
            .collect();
        Self { currencies }
    }
}

impl Canonicalizer {
    /// Build a canonicalizer with exactly the given currency table.
    pub fn new(currencies: BTreeMap<String, u8>) -> Self {
        let currencies = currencies
            .into_iter()
            .map(|(code, exp)| (code.trim().to_ascii_uppercase(), exp))
            .collect();
        Self { currencies }
    }

    /// Add or replace one currency.
    pub fn with_currency(mut self, code: &str, exponent: u8) -> Self {
        self.currencies
            .insert(code.trim().to_ascii_uppercase(), exponent);
        self
    }

    pub fn exponent(&self, code: &str) -> Option<u8> {
        self.currencies.get(code).copied()
    }

    /// Produce the canonical bytes of `record`.
    pub fn canonicalize<T: Canonicalize + ?Sized>(
        &self,
        record: &T,
    ) -> Result<Vec<u8>, CanonicalizationError> {
        let value = record.canonical_value(self)?;
        encode(&value)
    }

    // ── Field normalizers ─────────────────────────────────────────────────────

    /// Normalize a currency code, rejecting unknown or malformed codes.
    pub fn currency(&self, field: &str, code: &str) -> Result<String, CanonicalizationError> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.len() != 3 || !normalized.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(CanonicalizationError::InvalidCurrency {
                field: field.to_string(),
                code: code.to_string(),
            });
        }
        if !self.currencies.contains_key(&normalized) {
            return Err(CanonicalizationError::UnknownCurrency {
                field: field.to_string(),
                code: normalized,
            });
        }
        Ok(normalized)
    }

    /// Convert a decimal amount to integer minor units of `currency`.
    ///
    /// `currency` must already be normalized by [`Canonicalizer::currency`].
    pub fn minor_units(
        &self,
        field: &str,
        amount: &DecimalAmount,
        currency: &str,
    ) -> Result<i64, CanonicalizationError> {
        let exponent = self
            .exponent(currency)
            .ok_or_else(|| CanonicalizationError::UnknownCurrency {
                field: field.to_string(),
                code: currency.to_string(),
            })?;
        parse_minor_units(field, amount.as_str(), currency, exponent)
    }

    /// Normalize a timestamp to epoch milliseconds.
    pub fn timestamp(ts: &DateTime<Utc>) -> i64 {
        ts.timestamp_millis()
    }

    /// A string field that must carry a value.
    pub fn required(field: &str, value: &str) -> Result<CanonicalValue, CanonicalizationError> {
        if value.trim().is_empty() {
            return Err(CanonicalizationError::EmptyField {
                field: field.to_string(),
            });
        }
        Ok(CanonicalValue::Str(value.to_string()))
    }

    fn money(
        &self,
        field: &str,
        amount: &DecimalAmount,
        currency: &str,
    ) -> Result<CanonicalValue, CanonicalizationError> {
        Ok(CanonicalValue::Int(self.minor_units(field, amount, currency)?))
    }
}

fn parse_minor_units(
    field: &str,
    text: &str,
    currency: &str,
    exponent: u8,
) -> Result<i64, CanonicalizationError> {
    let invalid = || CanonicalizationError::InvalidAmount {
        field: field.to_string(),
        value: text.to_string(),
    };
    let overflow = || CanonicalizationError::AmountOverflow {
        field: field.to_string(),
        value: text.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(CanonicalizationError::NegativeAmount {
            field: field.to_string(),
            value: text.to_string(),
        });
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) || (unsigned.contains('.') && fraction.is_empty()) {
        return Err(invalid());
    }

    let exponent_len = usize::from(exponent);
    let (kept, excess) = if fraction.len() > exponent_len {
        fraction.split_at(exponent_len)
    } else {
        (fraction, "")
    };
    if excess.bytes().any(|b| b != b'0') {
        return Err(CanonicalizationError::ExcessPrecision {
            field: field.to_string(),
            value: text.to_string(),
            currency: currency.to_string(),
            exponent,
        });
    }

    let mut units: i64 = 0;
    for digit in whole.bytes().chain(kept.bytes()) {
        units = units
            .checked_mul(10)
            .and_then(|u| u.checked_add(i64::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    for _ in kept.len()..exponent_len {
        units = units.checked_mul(10).ok_or_else(overflow)?;
    }
    Ok(units)
}

// ── Record encodings ──────────────────────────────────────────────────────────

fn header(record: &str) -> CanonicalMap {
    CanonicalMap::new()
        .field("record", record)
        .field("v", CANONICAL_VERSION)
}

fn in_kind_item(
    c: &Canonicalizer,
    idx: usize,
    item: &InKindItem,
    currency: &str,
) -> Result<CanonicalValue, CanonicalizationError> {
    // Item valuations share the parent transaction's currency.
    Ok(CanonicalMap::new()
        .field(
            "description",
            Canonicalizer::required(&format!("in_kind_items[{idx}].description"), &item.description)?,
        )
        .field(
            "estimated_value",
            c.money(&format!("in_kind_items[{idx}].estimated_value"), &item.estimated_value, currency)?,
        )
        .field("image_url", item.image_url.as_deref())
        .build())
}

impl Canonicalize for TransactionRecord {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        let currency = c.currency("currency", &self.currency)?;

        let items = self
            .in_kind_items
            .iter()
            .enumerate()
            .map(|(idx, item)| in_kind_item(c, idx, item, &currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(header("transaction")
            .field("transaction_id", Canonicalizer::required("transaction_id", &self.transaction_id)?)
            .field("donor_id", self.donor_id.as_deref())
            .field("kind", self.kind.as_str())
            .field("amount", c.money("amount", &self.amount, &currency)?)
            .field("currency", currency)
            .field("in_kind_items", items)
            .field("payment_provider", self.payment_provider.as_deref())
            .field("payment_ref", self.payment_ref.as_deref())
            .field("campaign_id", self.campaign_id.as_deref())
            .field("status", self.status.as_str())
            .field("created_at", Canonicalizer::timestamp(&self.created_at))
            .field("receipt_id", self.receipt_id.as_deref())
            .build())
    }
}

impl Canonicalize for DistributionRecord {
    fn canonical_value(&self, _c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        Ok(CanonicalMap::new()
            .field(
                "to_beneficiary_id",
                Canonicalizer::required("distribution.to_beneficiary_id", &self.to_beneficiary_id)?,
            )
            .field("date", Canonicalizer::timestamp(&self.date))
            .field("proof_url", self.proof_url.as_deref())
            .build())
    }
}

impl Canonicalize for InventoryChange {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        let currency = c.currency("currency", &self.currency)?;
        let estimated_value = match &self.estimated_value {
            Some(amount) => c.money("estimated_value", amount, &currency)?,
            None => CanonicalValue::Absent,
        };
        let distribution = match &self.distribution {
            Some(d) => d.canonical_value(c)?,
            None => CanonicalValue::Absent,
        };

        Ok(header("inventory_change")
            .field("change_id", Canonicalizer::required("change_id", &self.change_id)?)
            .field("item_id", Canonicalizer::required("item_id", &self.item_id)?)
            .field("previous_status", self.previous_status.map(|s| s.as_str()))
            .field("status", self.status.as_str())
            .field("estimated_value", estimated_value)
            .field("currency", currency)
            .field("distribution", distribution)
            .field("changed_at", Canonicalizer::timestamp(&self.changed_at))
            .build())
    }
}

fn field_list(fields: &[String]) -> CanonicalValue {
    // Order of changed fields carries no meaning.
    let mut sorted: Vec<&String> = fields.iter().collect();
    sorted.sort();
    sorted.dedup();
    CanonicalValue::List(sorted.into_iter().map(|f| CanonicalValue::Str(f.clone())).collect())
}

impl Canonicalize for AdminActionKind {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        let map = CanonicalMap::new().field("kind", self.name());
        let map = match self {
            AdminActionKind::CampaignCreated {
                campaign_id,
                title,
                goal,
                currency,
            } => {
                let currency = c.currency("action.currency", currency)?;
                map.field("campaign_id", Canonicalizer::required("action.campaign_id", campaign_id)?)
                    .field("title", Canonicalizer::required("action.title", title)?)
                    .field("goal", c.money("action.goal", goal, &currency)?)
                    .field("currency", currency)
            }
            AdminActionKind::CampaignUpdated {
                campaign_id,
                changed_fields,
            } => map
                .field("campaign_id", Canonicalizer::required("action.campaign_id", campaign_id)?)
                .field("changed_fields", field_list(changed_fields)),
            AdminActionKind::CampaignClosed {
                campaign_id,
                raised,
                currency,
            } => {
                let currency = c.currency("action.currency", currency)?;
                map.field("campaign_id", Canonicalizer::required("action.campaign_id", campaign_id)?)
                    .field("raised", c.money("action.raised", raised, &currency)?)
                    .field("currency", currency)
            }
            AdminActionKind::UserRoleChanged {
                user_id,
                previous_role,
                role,
            } => map
                .field("user_id", Canonicalizer::required("action.user_id", user_id)?)
                .field("previous_role", previous_role.as_deref())
                .field("role", Canonicalizer::required("action.role", role)?),
            AdminActionKind::ReceiptIssued {
                receipt_id,
                transaction_id,
                verification_url,
            } => map
                .field("receipt_id", Canonicalizer::required("action.receipt_id", receipt_id)?)
                .field(
                    "transaction_id",
                    Canonicalizer::required("action.transaction_id", transaction_id)?,
                )
                .field("verification_url", verification_url.as_deref()),
            AdminActionKind::DonorProfileUpdated {
                donor_id,
                changed_fields,
            } => map
                .field("donor_id", Canonicalizer::required("action.donor_id", donor_id)?)
                .field("changed_fields", field_list(changed_fields)),
        };
        Ok(map.build())
    }
}

impl Canonicalize for AdminActionRecord {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        Ok(header("admin_action")
            .field("log_id", Canonicalizer::required("log_id", &self.log_id)?)
            .field("action", self.action.canonical_value(c)?)
            .field("performed_at", Canonicalizer::timestamp(&self.performed_at))
            .build())
    }
}

impl Canonicalize for LedgerRecord {
    fn canonical_value(&self, c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        match self {
            LedgerRecord::Transaction(t) => t.canonical_value(c),
            LedgerRecord::Inventory(i) => i.canonical_value(c),
            LedgerRecord::Admin(a) => a.canonical_value(c),
        }
    }
}

impl Canonicalize for CanonicalValue {
    fn canonical_value(&self, _c: &Canonicalizer) -> Result<CanonicalValue, CanonicalizationError> {
        Ok(self.clone())
    }
}
