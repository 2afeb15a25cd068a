//! # probity-config
//!
//! TOML-driven configuration for the Probity ledger.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use probity_config::LedgerConfig;
//!
//! let config = LedgerConfig::from_file(Path::new("config/ngo-ledger.toml"))?;
//! let engine = HashChainEngine::new(store, Arc::new(config.canonicalizer()))
//!     .with_retry_policy(config.retry.clone());
//! ```
//!
//! The currency table is part of the canonical form: changing an exponent
//! for a currency already on a chain makes its old payloads fail
//! verification.  Add currencies freely; never edit existing ones.

pub mod config;

pub use config::LedgerConfig;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use probity_contracts::{error::LedgerError, policy::RetryPolicy};

    use crate::LedgerConfig;

    fn config_error(toml: &str) -> String {
        match LedgerConfig::from_toml_str(toml) {
            Err(LedgerError::Config { reason }) => reason,
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    /// An empty document yields the defaults.
    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.checkpoint.interval_entries, 100);
        assert!(config.currencies.is_empty());
    }

    /// Every section is read when present.
    #[test]
    fn test_full_config() {
        let toml = r#"
            [retry]
            max_attempts = 8
            initial_backoff_ms = 2
            max_backoff_ms = 50

            [checkpoint]
            interval_entries = 25

            [currencies]
            KWD = 3
            JPY = 0
        "#;

        let config = LedgerConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.retry,
            RetryPolicy {
                max_attempts: 8,
                initial_backoff_ms: 2,
                max_backoff_ms: 50,
            }
        );
        assert_eq!(config.checkpoint.interval_entries, 25);
        assert_eq!(config.currencies.get("KWD"), Some(&3));
    }

    /// A partial section keeps the defaults for the fields it omits.
    #[test]
    fn test_partial_section() {
        let config = LedgerConfig::from_toml_str("[retry]\nmax_attempts = 2\n").unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.max_backoff_ms, 200);
    }

    /// Misspelled sections are errors rather than silently ignored.
    #[test]
    fn test_unknown_section_rejected() {
        let reason = config_error("[checkpoints]\ninterval_entries = 5\n");
        assert!(reason.contains("failed to parse"), "unexpected reason: {reason}");
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let reason = config_error("[retry\nmax_attempts = ");
        assert!(reason.contains("failed to parse"), "unexpected reason: {reason}");
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_zero_attempts_rejected() {
        let reason = config_error("[retry]\nmax_attempts = 0\n");
        assert!(reason.contains("max_attempts"), "unexpected reason: {reason}");
    }

    #[test]
    fn test_backoff_ceiling_below_initial_rejected() {
        let reason = config_error("[retry]\ninitial_backoff_ms = 100\nmax_backoff_ms = 10\n");
        assert!(reason.contains("max_backoff_ms"), "unexpected reason: {reason}");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let reason = config_error("[checkpoint]\ninterval_entries = 0\n");
        assert!(reason.contains("interval_entries"), "unexpected reason: {reason}");
    }

    /// Currency codes must be three letters with an exponent of at most 6.
    #[test]
    fn test_bad_currencies_rejected() {
        let reason = config_error("[currencies]\nUS = 2\n");
        assert!(reason.contains("three-letter"), "unexpected reason: {reason}");

        let reason = config_error("[currencies]\nU5D = 2\n");
        assert!(reason.contains("three-letter"), "unexpected reason: {reason}");

        let reason = config_error("[currencies]\nXAU = 9\n");
        assert!(reason.contains("maximum is 6"), "unexpected reason: {reason}");
    }

    // ── Canonicalizer ─────────────────────────────────────────────────────────

    /// Configured currencies extend the built-in table; lower-case codes are
    /// normalized.
    #[test]
    fn test_canonicalizer_merges_currencies() {
        let config = LedgerConfig::from_toml_str("[currencies]\nkwd = 3\n").unwrap();
        let canonicalizer = config.canonicalizer();

        assert_eq!(canonicalizer.exponent("KWD"), Some(3));
        assert_eq!(canonicalizer.exponent("INR"), Some(2), "built-ins must survive");
        assert_eq!(canonicalizer.exponent("JPY"), Some(0));
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    /// The configuration shipped with the demo must stay loadable.
    #[test]
    fn test_shipped_config_parses() {
        let config =
            LedgerConfig::from_toml_str(include_str!("../../../config/ngo-ledger.toml")).unwrap();
        assert_eq!(config.checkpoint.interval_entries, 50);
        assert_eq!(config.canonicalizer().exponent("KWD"), Some(3));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("probity-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[checkpoint]\ninterval_entries = 7\n").unwrap();

        let config = LedgerConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.checkpoint.interval_entries, 7);
    }

    #[test]
    fn test_missing_file_rejected() {
        let path = std::path::Path::new("/nonexistent/probity/ledger.toml");
        match LedgerConfig::from_file(path) {
            Err(LedgerError::Config { reason }) => {
                assert!(reason.contains("failed to read"), "unexpected reason: {reason}")
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
