use std::path::Path;
use std::sync::Arc;

use debtline_crypto::{CiphertextVerifier, PayloadVerifier, PlaintextVerifier};
use serde::{Deserialize, Serialize};

/// Shortest term a debt may carry, in days.
pub const MIN_TERM_DAYS: u32 = 1;
/// Longest term a debt may carry, in days (100 years).
pub const MAX_TERM_DAYS: u32 = 36_500;

/// Who may read debt and proposal details.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPolicy {
    /// Anyone may read; anonymous debtors are still redacted.
    #[default]
    Open,
    /// Only the debtor, readers the debtor granted, authorized creditors,
    /// and the owner may read.
    Restricted,
}

/// How amount and rate payloads are encoded on the way in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    /// Big-endian `u64`s, range-checked by the ledger's verifier.
    #[default]
    Plaintext,
    /// Opaque ciphertext; only the blob length is checked.
    Ciphertext,
}

/// Configuration for a [`DebtLedger`](crate::DebtLedger).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Shortest accepted term, in days.
    pub min_term_days: u32,
    /// Longest accepted term, in days.
    pub max_term_days: u32,
    pub read_policy: ReadPolicy,
    /// When `true`, only the debtor, an authorized creditor, or the owner
    /// may execute an accepted proposal. Off by default, matching the
    /// unrestricted behavior deployed clients rely on.
    pub restrict_execution: bool,
    pub payload_mode: PayloadMode,
    /// Platform cap on a plaintext principal amount.
    pub max_amount: u64,
    /// Cap on a plaintext interest rate, in basis points.
    pub max_rate_bps: u64,
    pub min_ciphertext_len: usize,
    pub max_ciphertext_len: usize,
    /// Longest accepted proposal reason, in bytes.
    pub max_reason_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_term_days: MIN_TERM_DAYS,
            max_term_days: MAX_TERM_DAYS,
            read_policy: ReadPolicy::Open,
            restrict_execution: false,
            payload_mode: PayloadMode::Plaintext,
            max_amount: 1_000_000_000_000_000,
            max_rate_bps: 10_000,
            min_ciphertext_len: 1,
            max_ciphertext_len: 8 * 1024,
            max_reason_len: 1024,
        }
    }
}

impl LedgerConfig {
    /// Default configuration with privacy-gated reads.
    pub fn restricted() -> Self {
        Self {
            read_policy: ReadPolicy::Restricted,
            ..Default::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_term_days < MIN_TERM_DAYS
            || self.max_term_days > MAX_TERM_DAYS
            || self.min_term_days > self.max_term_days
        {
            return Err(ConfigError::Invalid(format!(
                "term range {}..={} must lie within {MIN_TERM_DAYS}..={MAX_TERM_DAYS}",
                self.min_term_days, self.max_term_days
            )));
        }
        if self.max_amount == 0 {
            return Err(ConfigError::Invalid("max_amount must be positive".into()));
        }
        if self.min_ciphertext_len == 0 || self.min_ciphertext_len > self.max_ciphertext_len {
            return Err(ConfigError::Invalid(format!(
                "ciphertext length range {}..={} is empty or admits empty payloads",
                self.min_ciphertext_len, self.max_ciphertext_len
            )));
        }
        if self.max_reason_len == 0 {
            return Err(ConfigError::Invalid("max_reason_len must be positive".into()));
        }
        Ok(())
    }

    /// The payload verifier matching [`Self::payload_mode`].
    pub fn verifier(&self) -> Arc<dyn PayloadVerifier> {
        match self.payload_mode {
            PayloadMode::Plaintext => {
                Arc::new(PlaintextVerifier::new(self.max_amount, self.max_rate_bps))
            }
            PayloadMode::Ciphertext => Arc::new(CiphertextVerifier::new(
                self.min_ciphertext_len,
                self.max_ciphertext_len,
            )),
        }
    }

    pub(crate) fn term_in_range(&self, days: u32) -> bool {
        (self.min_term_days..=self.max_term_days).contains(&days)
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert_eq!(c.min_term_days, 1);
        assert_eq!(c.max_term_days, 36_500);
        assert_eq!(c.read_policy, ReadPolicy::Open);
        assert!(!c.restrict_execution);
        assert_eq!(c.payload_mode, PayloadMode::Plaintext);
        c.validate().unwrap();
    }

    #[test]
    fn term_bounds_are_inclusive() {
        let c = LedgerConfig::default();
        assert!(!c.term_in_range(0));
        assert!(c.term_in_range(1));
        assert!(c.term_in_range(36_500));
        assert!(!c.term_in_range(36_501));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = LedgerConfig::from_toml_str(
            r#"
            read_policy = "restricted"
            payload_mode = "ciphertext"
            max_term_days = 3650
            "#,
        )
        .unwrap();
        assert_eq!(c.read_policy, ReadPolicy::Restricted);
        assert_eq!(c.payload_mode, PayloadMode::Ciphertext);
        assert_eq!(c.max_term_days, 3650);
        assert_eq!(c.max_rate_bps, 10_000);
    }

    #[test]
    fn out_of_range_terms_are_rejected() {
        let err = LedgerConfig::from_toml_str("max_term_days = 40000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = LedgerConfig::from_toml_str("min_term_days = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = LedgerConfig::from_toml_str(r#"read_policy = "secret""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_round_trip() {
        let original = LedgerConfig::restricted();
        let text = original.to_toml_string().unwrap();
        assert_eq!(LedgerConfig::from_toml_str(&text).unwrap(), original);
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "restrict_execution = true\n").unwrap();
        let c = LedgerConfig::load(&path).unwrap();
        assert!(c.restrict_execution);

        let missing = LedgerConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }

    #[test]
    fn verifier_follows_payload_mode() {
        assert_eq!(LedgerConfig::default().verifier().name(), "plaintext");
        let c = LedgerConfig {
            payload_mode: PayloadMode::Ciphertext,
            ..Default::default()
        };
        assert_eq!(c.verifier().name(), "ciphertext");
    }
}
