use debtline_types::{DebtStatus, ProposalStatus};
use serde::{Deserialize, Serialize};

use crate::records::{DebtRecord, RestructuringProposal};

/// Aggregate counters over the whole ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_debts: u64,
    pub active_debts: u64,
    pub restructuring_debts: u64,
    pub resolved_debts: u64,
    pub defaulted_debts: u64,
    pub anonymous_debts: u64,
    pub total_proposals: u64,
    pub pending_proposals: u64,
    pub accepted_proposals: u64,
    pub rejected_proposals: u64,
    pub executed_proposals: u64,
    pub authorized_creditors: u64,
    pub event_count: u64,
}

impl LedgerStats {
    pub(crate) fn collect<'a>(
        debts: impl IntoIterator<Item = &'a DebtRecord>,
        proposals: impl IntoIterator<Item = &'a RestructuringProposal>,
    ) -> Self {
        let mut stats = Self::default();
        for debt in debts {
            stats.total_debts += 1;
            if debt.is_anonymous {
                stats.anonymous_debts += 1;
            }
            match debt.status {
                DebtStatus::Active => stats.active_debts += 1,
                DebtStatus::Restructuring => stats.restructuring_debts += 1,
                DebtStatus::Resolved => stats.resolved_debts += 1,
                DebtStatus::Defaulted => stats.defaulted_debts += 1,
            }
        }
        for proposal in proposals {
            stats.total_proposals += 1;
            match proposal.status {
                ProposalStatus::Pending => stats.pending_proposals += 1,
                ProposalStatus::Accepted => stats.accepted_proposals += 1,
                ProposalStatus::Rejected => stats.rejected_proposals += 1,
                ProposalStatus::Executed => stats.executed_proposals += 1,
            }
        }
        stats
    }

    /// Debts that can still change state.
    pub fn open_debts(&self) -> u64 {
        self.active_debts + self.restructuring_debts
    }
}
