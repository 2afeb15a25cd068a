//! Error types for the ledger.
//!
//! Every fallible ledger operation returns `LedgerResult<T>`.  Canonicalization
//! failures have their own type because they are produced by pure code and
//! always surface before anything touches a chain.

use thiserror::Error;

/// A record field did not have the type or shape the canonical form requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizationError {
    #[error("field '{field}': '{value}' is not a decimal amount")]
    InvalidAmount { field: String, value: String },

    #[error("field '{field}': amount '{value}' is negative")]
    NegativeAmount { field: String, value: String },

    #[error("field '{field}': amount '{value}' has more than {exponent} fractional digits for {currency}")]
    ExcessPrecision {
        field: String,
        value: String,
        currency: String,
        exponent: u8,
    },

    #[error("field '{field}': amount '{value}' does not fit in 64-bit minor units")]
    AmountOverflow { field: String, value: String },

    #[error("field '{field}': '{code}' is not a three-letter currency code")]
    InvalidCurrency { field: String, code: String },

    #[error("field '{field}': currency '{code}' has no configured minor-unit exponent")]
    UnknownCurrency { field: String, code: String },

    #[error("field '{field}' must not be empty")]
    EmptyField { field: String },

    #[error("key '{key}' is reserved by the canonical encoding")]
    ReservedKey { key: String },

    #[error("number '{value}' is not an integer and has no canonical form")]
    UnsupportedNumber { value: String },

    #[error("malformed canonical bytes: {reason}")]
    Malformed { reason: String },
}

/// The unified error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The record was rejected before any chain mutation.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The chain head moved between read and commit.  Retry with a fresh head.
    #[error("chain conflict on '{chain_id}': head moved before sequence {attempted} could commit")]
    ChainConflict { chain_id: String, attempted: u64 },

    /// Read or verification requested on a chain with no entries.
    #[error("chain '{chain_id}' has no entries")]
    ChainNotInitialized { chain_id: String },

    /// Recomputation disagreed with stored state.  Never retried.
    #[error("tamper detected on chain '{chain_id}' at sequence {sequence}: {reason}")]
    TamperDetected {
        chain_id: String,
        sequence: u64,
        reason: String,
    },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid range on chain '{chain_id}': {reason}")]
    InvalidRange { chain_id: String, reason: String },

    /// The supplied action does not describe the supplied record.
    #[error("action '{action}' cannot record a {resource_type} resource")]
    ActionMismatch { action: String, resource_type: String },

    /// The external record already references a different digest.
    #[error("audit hash already set on {resource}")]
    AuditHashAlreadySet { resource: String },

    /// The store adapter failed for a reason unrelated to chain state.
    #[error("ledger store failure: {reason}")]
    Store { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the Probity crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
