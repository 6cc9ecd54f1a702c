use std::collections::{BTreeMap, BTreeSet};

use debtline_types::{AccountId, DebtId};
use serde::{Deserialize, Serialize};

use crate::config::ReadPolicy;
use crate::records::DebtRecord;

/// Role state of a ledger: the owner, the creditor allow-list, and
/// per-debt read grants.
///
/// Roles overlap freely. The owner is placed on the creditor list at
/// construction and can later be removed from it without losing owner
/// rights.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owner: AccountId,
    creditors: BTreeSet<AccountId>,
    read_grants: BTreeMap<DebtId, BTreeSet<AccountId>>,
}

impl AccessControl {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            creditors: BTreeSet::from([owner]),
            read_grants: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn is_owner(&self, who: &AccountId) -> bool {
        self.owner == *who
    }

    pub fn is_creditor(&self, who: &AccountId) -> bool {
        self.creditors.contains(who)
    }

    /// Owner or authorized creditor: may mark defaults.
    pub fn is_platform_role(&self, who: &AccountId) -> bool {
        self.is_owner(who) || self.is_creditor(who)
    }

    /// Add or remove a creditor. Returns whether the list changed.
    pub fn set_creditor(&mut self, who: AccountId, authorized: bool) -> bool {
        if authorized {
            self.creditors.insert(who)
        } else {
            self.creditors.remove(&who)
        }
    }

    pub fn creditors(&self) -> impl Iterator<Item = &AccountId> {
        self.creditors.iter()
    }

    /// Returns whether the grant is new.
    pub fn grant_read(&mut self, debt: DebtId, reader: AccountId) -> bool {
        self.read_grants.entry(debt).or_default().insert(reader)
    }

    /// Returns whether a grant was removed.
    pub fn revoke_read(&mut self, debt: DebtId, reader: &AccountId) -> bool {
        let Some(readers) = self.read_grants.get_mut(&debt) else {
            return false;
        };
        let removed = readers.remove(reader);
        if readers.is_empty() {
            self.read_grants.remove(&debt);
        }
        removed
    }

    pub fn has_read_grant(&self, debt: DebtId, reader: &AccountId) -> bool {
        self.read_grants
            .get(&debt)
            .is_some_and(|readers| readers.contains(reader))
    }

    /// Debts with at least one read grant.
    pub fn granted_debts(&self) -> impl Iterator<Item = DebtId> + '_ {
        self.read_grants.keys().copied()
    }

    pub fn readers(&self, debt: DebtId) -> Vec<AccountId> {
        self.read_grants
            .get(&debt)
            .map(|readers| readers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `viewer` may read `debt` and its proposals under `policy`.
    pub fn can_read(&self, viewer: &AccountId, debt: &DebtRecord, policy: ReadPolicy) -> bool {
        match policy {
            ReadPolicy::Open => true,
            ReadPolicy::Restricted => {
                debt.debtor == *viewer
                    || self.is_platform_role(viewer)
                    || self.has_read_grant(debt.id, viewer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debtline_types::{DebtStatus, SealedValue, Timestamp};

    fn account(label: &str) -> AccountId {
        AccountId::from_label(label)
    }

    fn debt(debtor: AccountId) -> DebtRecord {
        DebtRecord {
            id: DebtId::FIRST,
            debtor,
            amount: SealedValue::default(),
            interest_rate: SealedValue::default(),
            original_term_days: 30,
            remaining_term_days: 30,
            created_at: Timestamp::zero(),
            updated_at: Timestamp::zero(),
            status: DebtStatus::Active,
            is_anonymous: true,
            data_hash: [0; 32],
        }
    }

    #[test]
    fn owner_is_auto_authorized() {
        let acl = AccessControl::new(account("owner"));
        assert!(acl.is_owner(&account("owner")));
        assert!(acl.is_creditor(&account("owner")));
        assert!(!acl.is_creditor(&account("bank")));
    }

    #[test]
    fn set_creditor_is_idempotent() {
        let mut acl = AccessControl::new(account("owner"));
        assert!(acl.set_creditor(account("bank"), true));
        assert!(!acl.set_creditor(account("bank"), true));
        assert!(acl.is_creditor(&account("bank")));
        assert!(acl.set_creditor(account("bank"), false));
        assert!(!acl.set_creditor(account("bank"), false));
        assert!(!acl.is_creditor(&account("bank")));
    }

    #[test]
    fn deauthorized_owner_keeps_platform_role() {
        let mut acl = AccessControl::new(account("owner"));
        acl.set_creditor(account("owner"), false);
        assert!(!acl.is_creditor(&account("owner")));
        assert!(acl.is_platform_role(&account("owner")));
    }

    #[test]
    fn restricted_reads_follow_roles_and_grants() {
        let mut acl = AccessControl::new(account("owner"));
        acl.set_creditor(account("bank"), true);
        let record = debt(account("debtor"));
        let policy = ReadPolicy::Restricted;

        assert!(acl.can_read(&account("debtor"), &record, policy));
        assert!(acl.can_read(&account("owner"), &record, policy));
        assert!(acl.can_read(&account("bank"), &record, policy));
        assert!(!acl.can_read(&account("auditor"), &record, policy));
        assert!(acl.can_read(&account("auditor"), &record, ReadPolicy::Open));

        assert!(acl.grant_read(record.id, account("auditor")));
        assert!(acl.can_read(&account("auditor"), &record, policy));
        assert_eq!(acl.readers(record.id), vec![account("auditor")]);

        assert!(acl.revoke_read(record.id, &account("auditor")));
        assert!(!acl.revoke_read(record.id, &account("auditor")));
        assert!(!acl.can_read(&account("auditor"), &record, policy));
        assert!(acl.readers(record.id).is_empty());
    }
}
