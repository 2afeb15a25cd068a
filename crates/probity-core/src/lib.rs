//! # probity-core
//!
//! The deterministic canonicalizer and the store-adapter traits of the
//! Probity ledger.
//!
//! This crate provides:
//! - `Canonicalizer`, which turns ledger records into canonical bytes
//! - The canonical value model with its encoder and parser
//! - The two trust-boundary traits (`LedgerStore`, `RecordStore`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use probity_core::{Canonicalizer, traits::{LedgerStore, RecordStore}};
//!
//! let bytes = Canonicalizer::default().canonicalize(&record)?;
//! ```

pub mod canonical;
pub mod canonicalizer;
pub mod traits;

pub use canonical::{CanonicalMap, CanonicalValue};
pub use canonicalizer::{Canonicalize, Canonicalizer};

// ── Tests ─────────────────────────────────────────────────────────────────────
