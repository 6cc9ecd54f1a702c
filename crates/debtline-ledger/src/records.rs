use std::fmt;

use debtline_crypto::ContentHasher;
use debtline_types::{
    AccountId, DebtId, DebtStatus, ProposalId, ProposalStatus, SealedValue, Timestamp,
};
use serde::{Deserialize, Serialize};

/// The transaction context of one ledger call: who is calling, and when.
///
/// Supplied by the authentication and submission layers in front of the
/// ledger. The ledger trusts both fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Call {
    pub caller: AccountId,
    pub at: Timestamp,
}

impl Call {
    pub fn new(caller: AccountId, at: Timestamp) -> Self {
        Self { caller, at }
    }

    /// A call stamped with the current wall-clock time.
    pub fn now(caller: AccountId) -> Self {
        Self::new(caller, Timestamp::now())
    }
}

/// Which approval flag a vote sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteRole {
    Debtor,
    Creditor,
}

impl VoteRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debtor => "debtor",
            Self::Creditor => "creditor",
        }
    }
}

impl fmt::Display for VoteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A debt as stored by the ledger. Never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtRecord {
    pub id: DebtId,
    /// The creator. Kept even for anonymous debts; only reads redact it.
    pub debtor: AccountId,
    pub amount: SealedValue,
    pub interest_rate: SealedValue,
    pub original_term_days: u32,
    pub remaining_term_days: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub status: DebtStatus,
    pub is_anonymous: bool,
    /// Digest of amount, rate, and terms; see [`DebtRecord::compute_data_hash`].
    #[serde(with = "crate::hex_digest")]
    pub data_hash: [u8; 32],
}

impl DebtRecord {
    /// BLAKE3 digest over the record's financial fields.
    pub fn compute_data_hash(&self) -> [u8; 32] {
        let id = self.id.get().to_le_bytes();
        let original = self.original_term_days.to_le_bytes();
        let remaining = self.remaining_term_days.to_le_bytes();
        ContentHasher::DEBT.hash_parts(&[
            id.as_slice(),
            self.amount.as_bytes(),
            self.interest_rate.as_bytes(),
            original.as_slice(),
            remaining.as_slice(),
        ])
    }

    pub fn verify_data_hash(&self) -> bool {
        self.compute_data_hash() == self.data_hash
    }

    pub(crate) fn refresh_data_hash(&mut self) {
        self.data_hash = self.compute_data_hash();
    }

    /// The debtor as shown to readers.
    pub fn visible_debtor(&self) -> AccountId {
        if self.is_anonymous {
            AccountId::ZERO
        } else {
            self.debtor
        }
    }

    pub fn view(&self) -> DebtView {
        DebtView {
            id: self.id,
            debtor: self.visible_debtor(),
            amount: self.amount.clone(),
            interest_rate: self.interest_rate.clone(),
            original_term_days: self.original_term_days,
            remaining_term_days: self.remaining_term_days,
            created_at: self.created_at,
            updated_at: self.updated_at,
            status: self.status,
            is_anonymous: self.is_anonymous,
            data_hash: self.data_hash,
        }
    }
}

/// Read-side projection of a [`DebtRecord`] with the debtor redacted when
/// the debt is anonymous.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtView {
    pub id: DebtId,
    /// [`AccountId::ZERO`] for anonymous debts.
    pub debtor: AccountId,
    pub amount: SealedValue,
    pub interest_rate: SealedValue,
    pub original_term_days: u32,
    pub remaining_term_days: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub status: DebtStatus,
    pub is_anonymous: bool,
    #[serde(with = "crate::hex_digest")]
    pub data_hash: [u8; 32],
}

/// A request to replace a debt's amount, rate, and remaining term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestructuringProposal {
    pub id: ProposalId,
    pub debt_id: DebtId,
    pub proposer: AccountId,
    pub new_amount: SealedValue,
    pub new_interest_rate: SealedValue,
    pub new_term_days: u32,
    pub proposed_at: Timestamp,
    /// When the vote outcome (ACCEPTED or REJECTED) was reached.
    pub decided_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
    pub status: ProposalStatus,
    pub creditor_approval: bool,
    pub debtor_approval: bool,
    pub reason: String,
}

impl RestructuringProposal {
    pub fn has_voted(&self, role: VoteRole) -> bool {
        match role {
            VoteRole::Debtor => self.debtor_approval,
            VoteRole::Creditor => self.creditor_approval,
        }
    }

    pub fn fully_approved(&self) -> bool {
        self.debtor_approval && self.creditor_approval
    }

    /// Read-side projection. `redact_proposer` hides a proposer who is the
    /// anonymous debtor of the parent debt.
    pub fn view(&self, redact_proposer: bool) -> ProposalView {
        ProposalView {
            id: self.id,
            debt_id: self.debt_id,
            proposer: if redact_proposer {
                AccountId::ZERO
            } else {
                self.proposer
            },
            new_amount: self.new_amount.clone(),
            new_interest_rate: self.new_interest_rate.clone(),
            new_term_days: self.new_term_days,
            proposed_at: self.proposed_at,
            decided_at: self.decided_at,
            executed_at: self.executed_at,
            status: self.status,
            creditor_approval: self.creditor_approval,
            debtor_approval: self.debtor_approval,
            reason: self.reason.clone(),
        }
    }
}

/// Read-side projection of a [`RestructuringProposal`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: ProposalId,
    pub debt_id: DebtId,
    pub proposer: AccountId,
    pub new_amount: SealedValue,
    pub new_interest_rate: SealedValue,
    pub new_term_days: u32,
    pub proposed_at: Timestamp,
    pub decided_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
    pub status: ProposalStatus,
    pub creditor_approval: bool,
    pub debtor_approval: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(anonymous: bool) -> DebtRecord {
        let mut record = DebtRecord {
            id: DebtId::FIRST,
            debtor: AccountId::from_label("debtor"),
            amount: SealedValue::from_bytes(vec![1; 8]),
            interest_rate: SealedValue::from_bytes(vec![2; 8]),
            original_term_days: 365,
            remaining_term_days: 365,
            created_at: Timestamp::from_secs(10),
            updated_at: Timestamp::from_secs(10),
            status: DebtStatus::Active,
            is_anonymous: anonymous,
            data_hash: [0; 32],
        };
        record.refresh_data_hash();
        record
    }

    #[test]
    fn anonymous_view_redacts_debtor() {
        let r = record(true);
        assert!(r.view().debtor.is_zero());
        assert_eq!(r.debtor, AccountId::from_label("debtor"));
        assert_eq!(record(false).view().debtor, AccountId::from_label("debtor"));
    }

    #[test]
    fn data_hash_tracks_financial_fields() {
        let mut r = record(false);
        assert!(r.verify_data_hash());
        r.remaining_term_days = 730;
        assert!(!r.verify_data_hash());
        r.refresh_data_hash();
        assert!(r.verify_data_hash());
    }

    #[test]
    fn data_hash_ignores_status() {
        let mut r = record(false);
        let before = r.data_hash;
        r.status = DebtStatus::Restructuring;
        assert_eq!(r.compute_data_hash(), before);
    }

    #[test]
    fn digest_serializes_as_hex() {
        let r = record(false);
        let json = serde_json::to_value(&r).unwrap();
        let hash = json["data_hash"].as_str().unwrap();
        assert_eq!(hash.len(), 64);
        let parsed: DebtRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, r);
    }
}
