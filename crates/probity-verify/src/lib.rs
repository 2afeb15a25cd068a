//! # probity-verify
//!
//! Verification and anchoring for Probity chains.
//!
//! - [`engine::ChainVerifier`] recomputes a chain, fully or from a trusted
//!   checkpoint, and reports the first point of divergence.  It also answers
//!   donor receipt checks.
//! - [`checkpoint::CheckpointService`] folds contiguous segments into
//!   checkpoint roots that can be published outside the store.
//!
//! Neither component writes entries.  Both run concurrently with appends and
//! work against the head they read when they start.
//!
//! ```rust,ignore
//! let verifier = Arc::new(ChainVerifier::new(store.clone(), records, canonicalizer));
//! let result = verifier.verify_range(&chain_id, 0, 2)?;
//! if !result.ok {
//!     eprintln!("tampered at {:?}", result.first_divergence);
//! }
//! ```

pub mod checkpoint;
pub mod engine;

pub use checkpoint::CheckpointService;
pub use engine::ChainVerifier;

// ── Tests ─────────────────────────────────────────────────────────────────────
