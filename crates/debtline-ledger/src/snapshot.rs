use debtline_crypto::ContentHasher;
use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::event::EventLog;
use crate::records::{DebtRecord, RestructuringProposal};
use crate::validation::{LedgerValidator, ValidationReport};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full serializable state of a [`DebtLedger`](crate::DebtLedger).
///
/// Per-identity indexes are not stored; they are rebuilt from the records
/// on restore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub config: LedgerConfig,
    pub access: AccessControl,
    pub debts: Vec<DebtRecord>,
    pub proposals: Vec<RestructuringProposal>,
    pub events: EventLog,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn from_json(source: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(source).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Content digest of the whole snapshot.
    pub fn digest(&self) -> Result<[u8; 32], LedgerError> {
        ContentHasher::SNAPSHOT
            .hash_json(self)
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> ValidationReport {
        LedgerValidator::validate(
            &self.access,
            &self.debts,
            &self.proposals,
            self.events.events(),
        )
    }

    /// Reject snapshots that cannot be restored as-is.
    pub(crate) fn check(&self) -> Result<(), LedgerError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(LedgerError::Serialization(format!(
                "unsupported snapshot version {}, expected {SNAPSHOT_VERSION}",
                self.version
            )));
        }
        self.config.validate()?;

        let report = self.validate();
        if let Some(first) = report.violations.first() {
            let seq = self.events.head().map(|e| e.seq).unwrap_or(0);
            return Err(LedgerError::IntegrityViolation {
                seq,
                reason: format!(
                    "{}: {} ({} violations)",
                    first.subject,
                    first.description,
                    report.violations.len()
                ),
            });
        }
        Ok(())
    }
}
