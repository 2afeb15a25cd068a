//! Ledger configuration schema and loader.
//!
//! A `LedgerConfig` is deserialized from TOML.  Every section is optional;
//! anything left out takes its default.
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 5
//! max_backoff_ms = 200
//!
//! [checkpoint]
//! interval_entries = 100
//!
//! [currencies]
//! INR = 2
//! JPY = 0
//! ```
//!
//! Currencies listed here are merged over the built-in table, so a file only
//! needs to name the codes it adds or overrides.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use probity_contracts::{
    error::{LedgerError, LedgerResult},
    policy::{CheckpointPolicy, RetryPolicy},
};
use probity_core::{canonicalizer::MAX_EXPONENT, Canonicalizer};

/// Runtime settings for the ledger: append retry, checkpoint schedule, and
/// the currency exponent table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub retry: RetryPolicy,
    pub checkpoint: CheckpointPolicy,

    /// ISO 4217 code → minor-unit exponent.
    pub currencies: BTreeMap<String, u8>,
}

impl LedgerConfig {
    /// Parse and validate `s`.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed, does not match
    /// the schema, or holds values `validate` rejects.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse ledger TOML: {}", e),
        })?;
        config.validate()?;
        debug!(
            max_attempts = config.retry.max_attempts,
            interval_entries = config.checkpoint.interval_entries,
            currencies = config.currencies.len(),
            "ledger configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it with `from_toml_str`.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read ledger config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject settings the ledger cannot run with.
    pub fn validate(&self) -> LedgerResult<()> {
        let invalid = |reason: String| Err(LedgerError::Config { reason });

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return invalid(format!(
                "retry.max_backoff_ms ({}) is below retry.initial_backoff_ms ({})",
                self.retry.max_backoff_ms, self.retry.initial_backoff_ms
            ));
        }
        if self.checkpoint.interval_entries == 0 {
            return invalid("checkpoint.interval_entries must be at least 1".to_string());
        }
        for (code, exponent) in &self.currencies {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return invalid(format!("currency code '{code}' is not a three-letter code"));
            }
            if *exponent > MAX_EXPONENT {
                return invalid(format!(
                    "currency {code} has exponent {exponent}; the maximum is {MAX_EXPONENT}"
                ));
            }
        }
        Ok(())
    }

    /// The built-in currency table with this config's currencies merged over it.
    pub fn canonicalizer(&self) -> Canonicalizer {
        self.currencies
            .iter()
            .fold(Canonicalizer::default(), |c, (code, exponent)| {
                c.with_currency(code, *exponent)
            })
    }
}
