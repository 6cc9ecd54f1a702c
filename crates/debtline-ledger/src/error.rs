use debtline_types::{DebtId, DebtStatus, ProposalId, ProposalStatus};

use crate::config::ConfigError;

/// Errors produced by ledger operations.
///
/// Every mutating call either applies completely or returns one of these
/// with the ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    DebtNotFound(DebtId),

    #[error("{0} not found")]
    ProposalNotFound(ProposalId),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid interest rate: {0}")]
    InvalidRate(String),

    #[error("invalid term: {days} days (allowed {min}..={max})")]
    InvalidTerm { days: u32, min: u32, max: u32 },

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("{id} is {status} and not eligible")]
    DebtNotEligible { id: DebtId, status: DebtStatus },

    #[error("{id} is {status}, expected ACTIVE")]
    DebtNotActive { id: DebtId, status: DebtStatus },

    #[error("{id} is {status}, expected PENDING")]
    ProposalNotPending { id: ProposalId, status: ProposalStatus },

    #[error("{id} is {status}, expected ACCEPTED")]
    ProposalNotAccepted { id: ProposalId, status: ProposalStatus },

    #[error("{role} has already voted on {id}")]
    AlreadyApproved { id: ProposalId, role: &'static str },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("integrity violation at event {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub(crate) fn unauthorized(what: impl Into<String>) -> Self {
        Self::Unauthorized(what.into())
    }

    /// Returns `true` for the not-found family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DebtNotFound(_) | Self::ProposalNotFound(_))
    }
}
