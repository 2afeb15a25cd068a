//! # probity-ref-ngo
//!
//! NGO reference runtime for the Probity tamper-evident ledger.
//!
//! [`ledger::NgoLedger`] is the facade a donation platform would call: it
//! appends, verifies, checkpoints, and answers receipt and transparency
//! queries over one ledger store and one external record store.
//!
//! Five scenarios run it against mock data for a fictional relief
//! organization:
//!
//! 1. **Donation Audit Trail**: mixed donations, inventory, and admin
//!    actions on one chain, verified end to end.
//! 2. **Tamper Detection**: database edits reported at the exact entry.
//! 3. **Checkpoint Anchoring**: published roots that localize a rewrite.
//! 4. **Concurrent Appends**: racing workers serialized by compare-and-swap.
//! 5. **Donor Receipt Verification**: the public receipt check.
//!
//! All data is hardcoded and fictional.  Nothing is persisted.

pub mod ledger;
pub mod mock_data;
pub mod scenarios;

pub use ledger::NgoLedger;
