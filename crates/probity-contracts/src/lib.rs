//! # probity-contracts
//!
//! Shared types, records, and error contracts for the Probity ledger.
//!
//! All crates in the workspace import from here. No chain logic lives in
//! this crate, only data definitions and error types.

pub mod digest;
pub mod entry;
pub mod error;
pub mod ids;
pub mod policy;
pub mod record;
pub mod verify;
