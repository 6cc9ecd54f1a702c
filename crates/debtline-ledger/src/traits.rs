use debtline_types::{AccountId, DebtId, ProposalId, ProposalStatus, SealedValue};

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::records::{Call, DebtView, ProposalView};
use crate::stats::LedgerStats;

/// Write boundary for debt lifecycle operations.
///
/// Each call is atomic: it either applies every state change and event or
/// returns an error with nothing changed.
pub trait DebtWriter: Send + Sync {
    /// Owner only. Adds or removes `creditor` from the allow-list.
    fn set_authorized_creditor(
        &self,
        call: &Call,
        creditor: AccountId,
        authorized: bool,
    ) -> Result<(), LedgerError>;

    fn create_debt(
        &self,
        call: &Call,
        amount: SealedValue,
        interest_rate: SealedValue,
        term_days: u32,
        is_anonymous: bool,
    ) -> Result<DebtId, LedgerError>;

    fn propose_restructuring(
        &self,
        call: &Call,
        debt_id: DebtId,
        new_amount: SealedValue,
        new_interest_rate: SealedValue,
        new_term_days: u32,
        reason: &str,
    ) -> Result<ProposalId, LedgerError>;

    /// Records one vote and returns the proposal's status afterwards.
    fn approve_proposal(
        &self,
        call: &Call,
        proposal_id: ProposalId,
        approve: bool,
    ) -> Result<ProposalStatus, LedgerError>;

    fn execute_proposal(&self, call: &Call, proposal_id: ProposalId) -> Result<(), LedgerError>;

    fn mark_debt_resolved(&self, call: &Call, debt_id: DebtId) -> Result<(), LedgerError>;

    fn mark_debt_defaulted(&self, call: &Call, debt_id: DebtId) -> Result<(), LedgerError>;

    fn grant_read_access(
        &self,
        call: &Call,
        debt_id: DebtId,
        reader: AccountId,
    ) -> Result<(), LedgerError>;

    fn revoke_read_access(
        &self,
        call: &Call,
        debt_id: DebtId,
        reader: AccountId,
    ) -> Result<(), LedgerError>;
}

/// Read boundary. `viewer` is checked against the ledger's read policy.
pub trait DebtReader: Send + Sync {
    fn debt_info(&self, viewer: &AccountId, debt_id: DebtId) -> Result<DebtView, LedgerError>;

    fn proposal_info(
        &self,
        viewer: &AccountId,
        proposal_id: ProposalId,
    ) -> Result<ProposalView, LedgerError>;

    /// Debts created by `user`, in creation order.
    fn user_debts(&self, viewer: &AccountId, user: &AccountId)
        -> Result<Vec<DebtId>, LedgerError>;

    /// Proposals filed by `user`, in creation order.
    fn user_proposals(
        &self,
        viewer: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<ProposalId>, LedgerError>;

    fn proposals_for_debt(
        &self,
        viewer: &AccountId,
        debt_id: DebtId,
    ) -> Result<Vec<ProposalId>, LedgerError>;

    fn debt_count(&self) -> Result<u64, LedgerError>;

    fn proposal_count(&self) -> Result<u64, LedgerError>;

    fn owner(&self) -> Result<AccountId, LedgerError>;

    fn is_authorized_creditor(&self, who: &AccountId) -> Result<bool, LedgerError>;

    fn stats(&self) -> Result<LedgerStats, LedgerError>;

    /// Events from `from_seq` onward (1-based, inclusive).
    fn events_since(&self, from_seq: u64) -> Result<Vec<LedgerEvent>, LedgerError>;
}
