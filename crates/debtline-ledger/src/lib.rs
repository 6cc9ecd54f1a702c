//! Debt lifecycle ledger for Debtline.
//!
//! This crate is the heart of Debtline. It provides:
//! - Debt records and restructuring proposals with sealed amounts and rates
//! - `DebtWriter` / `DebtReader` trait boundaries
//! - `DebtLedger`, an in-memory implementation with atomic, role-checked
//!   mutations and privacy-filtered reads
//! - A hash-linked event log of every state transition
//! - Snapshots for persistence and integrity validation on restore

pub mod access;
pub mod config;
pub mod error;
pub mod event;
mod hex_digest;
pub mod ledger;
pub mod records;
pub mod snapshot;
pub mod stats;
pub mod traits;
pub mod validation;

pub use access::AccessControl;
pub use config::{ConfigError, LedgerConfig, PayloadMode, ReadPolicy, MAX_TERM_DAYS, MIN_TERM_DAYS};
pub use error::LedgerError;
pub use event::{EventKind, EventLog, EventPayload, LedgerEvent};
pub use ledger::DebtLedger;
pub use records::{
    Call, DebtRecord, DebtView, ProposalView, RestructuringProposal, VoteRole,
};
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use stats::LedgerStats;
pub use traits::{DebtReader, DebtWriter};
pub use validation::{LedgerValidator, ValidationReport, Violation, ViolationKind};
