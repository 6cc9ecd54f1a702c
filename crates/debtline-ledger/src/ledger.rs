use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use debtline_crypto::PayloadVerifier;
use debtline_types::{
    AccountId, DebtId, DebtStatus, ProposalId, ProposalStatus, SealedValue,
};
use tracing::{debug, info};

use crate::access::AccessControl;
use crate::config::{LedgerConfig, ReadPolicy};
use crate::error::LedgerError;
use crate::event::{EventLog, EventPayload, LedgerEvent};
use crate::records::{
    Call, DebtRecord, DebtView, ProposalView, RestructuringProposal, VoteRole,
};
use crate::snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
use crate::stats::LedgerStats;
use crate::traits::{DebtReader, DebtWriter};
use crate::validation::{LedgerValidator, ValidationReport};

/// In-memory debt ledger.
///
/// All state sits behind one [`RwLock`]. Mutations validate every
/// precondition before touching state, so a failed call leaves the ledger
/// exactly as it was.
pub struct DebtLedger {
    config: LedgerConfig,
    verifier: Arc<dyn PayloadVerifier>,
    inner: RwLock<LedgerState>,
}

struct LedgerState {
    access: AccessControl,
    debts: Vec<DebtRecord>,
    proposals: Vec<RestructuringProposal>,
    user_debts: BTreeMap<AccountId, Vec<DebtId>>,
    user_proposals: BTreeMap<AccountId, Vec<ProposalId>>,
    debt_proposals: BTreeMap<DebtId, Vec<ProposalId>>,
    events: EventLog,
}

impl LedgerState {
    fn new(owner: AccountId) -> Self {
        Self::from_parts(
            AccessControl::new(owner),
            Vec::new(),
            Vec::new(),
            EventLog::new(),
        )
    }

    fn from_parts(
        access: AccessControl,
        debts: Vec<DebtRecord>,
        proposals: Vec<RestructuringProposal>,
        events: EventLog,
    ) -> Self {
        let mut user_debts: BTreeMap<AccountId, Vec<DebtId>> = BTreeMap::new();
        for debt in &debts {
            user_debts.entry(debt.debtor).or_default().push(debt.id);
        }
        let mut user_proposals: BTreeMap<AccountId, Vec<ProposalId>> = BTreeMap::new();
        let mut debt_proposals: BTreeMap<DebtId, Vec<ProposalId>> = BTreeMap::new();
        for proposal in &proposals {
            user_proposals
                .entry(proposal.proposer)
                .or_default()
                .push(proposal.id);
            debt_proposals
                .entry(proposal.debt_id)
                .or_default()
                .push(proposal.id);
        }
        Self {
            access,
            debts,
            proposals,
            user_debts,
            user_proposals,
            debt_proposals,
            events,
        }
    }

    /// Ids are dense from 1, so a record's index is its id minus one.
    fn debt_index(&self, id: DebtId) -> Result<usize, LedgerError> {
        id.get()
            .checked_sub(1)
            .map(|i| i as usize)
            .filter(|i| *i < self.debts.len())
            .ok_or(LedgerError::DebtNotFound(id))
    }

    fn proposal_index(&self, id: ProposalId) -> Result<usize, LedgerError> {
        id.get()
            .checked_sub(1)
            .map(|i| i as usize)
            .filter(|i| *i < self.proposals.len())
            .ok_or(LedgerError::ProposalNotFound(id))
    }

    fn debt(&self, id: DebtId) -> Result<&DebtRecord, LedgerError> {
        Ok(&self.debts[self.debt_index(id)?])
    }

    fn proposal(&self, id: ProposalId) -> Result<&RestructuringProposal, LedgerError> {
        Ok(&self.proposals[self.proposal_index(id)?])
    }

    fn next_debt_id(&self) -> DebtId {
        self.debts.last().map_or(DebtId::FIRST, |d| d.id.next())
    }

    fn next_proposal_id(&self) -> ProposalId {
        self.proposals
            .last()
            .map_or(ProposalId::FIRST, |p| p.id.next())
    }
}

/// The identity recorded for `caller` acting on `debt`: the anonymous
/// debtor of a debt never appears in events.
fn visible_actor(debt: &DebtRecord, caller: &AccountId) -> AccountId {
    if debt.is_anonymous && debt.debtor == *caller {
        AccountId::ZERO
    } else {
        *caller
    }
}

impl DebtLedger {
    /// A fresh ledger owned by `owner`, using the verifier selected by
    /// `config.payload_mode`.
    pub fn new(owner: AccountId, config: LedgerConfig) -> Result<Self, LedgerError> {
        let verifier = config.verifier();
        Self::with_verifier(owner, config, verifier)
    }

    pub fn with_verifier(
        owner: AccountId,
        config: LedgerConfig,
        verifier: Arc<dyn PayloadVerifier>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        info!(owner = %owner, verifier = verifier.name(), "debt ledger created");
        Ok(Self {
            config,
            verifier,
            inner: RwLock::new(LedgerState::new(owner)),
        })
    }

    /// Rebuild a ledger from a snapshot after re-validating it.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        let verifier = snapshot.config.verifier();
        Self::restore_with_verifier(snapshot, verifier)
    }

    pub fn restore_with_verifier(
        snapshot: LedgerSnapshot,
        verifier: Arc<dyn PayloadVerifier>,
    ) -> Result<Self, LedgerError> {
        snapshot.check()?;
        let LedgerSnapshot {
            config,
            access,
            debts,
            proposals,
            events,
            ..
        } = snapshot;
        info!(
            debts = debts.len(),
            proposals = proposals.len(),
            events = events.len(),
            "debt ledger restored"
        );
        Ok(Self {
            config,
            verifier,
            inner: RwLock::new(LedgerState::from_parts(access, debts, proposals, events)),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.read_state()?;
        Ok(LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            access: state.access.clone(),
            debts: state.debts.clone(),
            proposals: state.proposals.clone(),
            events: state.events.clone(),
        })
    }

    /// Check the event chain, record consistency, and that stored state
    /// matches what the event log replays to.
    pub fn validate(&self) -> Result<ValidationReport, LedgerError> {
        let state = self.read_state()?;
        Ok(LedgerValidator::validate(
            &state.access,
            &state.debts,
            &state.proposals,
            state.events.events(),
        ))
    }

    /// Fail with the first event-chain violation, if any.
    pub fn validate_events(&self) -> Result<(), LedgerError> {
        let state = self.read_state()?;
        let violations = LedgerValidator::validate_events(state.events.events());
        match violations.into_iter().next() {
            None => Ok(()),
            Some(v) => Err(LedgerError::IntegrityViolation {
                seq: v.seq,
                reason: v.description,
            }),
        }
    }

    /// The whole event log.
    pub fn events(&self) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.read_state()?.events.events().to_vec())
    }

    /// Readers granted access to a debt. Visible to the debtor and the
    /// platform roles only.
    pub fn readers(
        &self,
        viewer: &AccountId,
        debt_id: DebtId,
    ) -> Result<Vec<AccountId>, LedgerError> {
        let state = self.read_state()?;
        let debt = state.debt(debt_id)?;
        if debt.debtor != *viewer && !state.access.is_platform_role(viewer) {
            return Err(LedgerError::AccessDenied(format!("read grants of {debt_id}")));
        }
        Ok(state.access.readers(debt_id))
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn check_term(&self, days: u32) -> Result<(), LedgerError> {
        if self.config.term_in_range(days) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTerm {
                days,
                min: self.config.min_term_days,
                max: self.config.max_term_days,
            })
        }
    }

    fn check_proposal_terms(
        &self,
        new_amount: &SealedValue,
        new_interest_rate: &SealedValue,
        new_term_days: u32,
        reason: &str,
    ) -> Result<(), LedgerError> {
        if !self.config.term_in_range(new_term_days) {
            return Err(LedgerError::InvalidProposal(format!(
                "term {new_term_days} days outside {}..={}",
                self.config.min_term_days, self.config.max_term_days
            )));
        }
        self.verifier
            .verify_amount(new_amount)
            .map_err(|e| LedgerError::InvalidProposal(format!("amount: {e}")))?;
        self.verifier
            .verify_rate(new_interest_rate)
            .map_err(|e| LedgerError::InvalidProposal(format!("interest rate: {e}")))?;
        if reason.trim().is_empty() {
            return Err(LedgerError::InvalidProposal("reason must not be empty".into()));
        }
        if reason.len() > self.config.max_reason_len {
            return Err(LedgerError::InvalidProposal(format!(
                "reason is {} bytes, limit {}",
                reason.len(),
                self.config.max_reason_len
            )));
        }
        Ok(())
    }

    /// Under the restricted policy, identity indexes are visible only to
    /// the identity itself and the platform roles. Under the open policy
    /// anyone may list them, but see [`Self::sees_anonymous`].
    fn check_index_access(
        &self,
        state: &LedgerState,
        viewer: &AccountId,
        user: &AccountId,
    ) -> Result<(), LedgerError> {
        if self.config.read_policy == ReadPolicy::Restricted
            && viewer != user
            && !state.access.is_platform_role(viewer)
        {
            return Err(LedgerError::AccessDenied(format!("records of {user}")));
        }
        Ok(())
    }

    /// Whether `viewer` may see that `user` is behind their anonymous debts.
    fn sees_anonymous(state: &LedgerState, viewer: &AccountId, user: &AccountId) -> bool {
        viewer == user || state.access.is_platform_role(viewer)
    }
}

impl fmt::Debug for DebtLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebtLedger")
            .field("config", &self.config)
            .field("verifier", &self.verifier.name())
            .finish_non_exhaustive()
    }
}

impl DebtWriter for DebtLedger {
    fn set_authorized_creditor(
        &self,
        call: &Call,
        creditor: AccountId,
        authorized: bool,
    ) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let at = state.events.clamp(call.at);
        if !state.access.is_owner(&call.caller) {
            return Err(LedgerError::unauthorized(
                "only the owner may change creditor authorization",
            ));
        }

        if state.access.set_creditor(creditor, authorized) {
            state.events.append(
                at,
                call.caller,
                EventPayload::CreditorAuthorizationChanged {
                    creditor,
                    authorized,
                },
            );
            info!(creditor = %creditor, authorized, "creditor authorization changed");
        } else {
            debug!(creditor = %creditor, authorized, "creditor authorization unchanged");
        }
        Ok(())
    }

    fn create_debt(
        &self,
        call: &Call,
        amount: SealedValue,
        interest_rate: SealedValue,
        term_days: u32,
        is_anonymous: bool,
    ) -> Result<DebtId, LedgerError> {
        self.check_term(term_days)?;
        self.verifier
            .verify_amount(&amount)
            .map_err(|e| LedgerError::InvalidAmount(e.to_string()))?;
        self.verifier
            .verify_rate(&interest_rate)
            .map_err(|e| LedgerError::InvalidRate(e.to_string()))?;

        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let id = state.next_debt_id();
        let mut debt = DebtRecord {
            id,
            debtor: call.caller,
            amount,
            interest_rate,
            original_term_days: term_days,
            remaining_term_days: term_days,
            created_at: at,
            updated_at: at,
            status: DebtStatus::Active,
            is_anonymous,
            data_hash: [0; 32],
        };
        debt.refresh_data_hash();
        let debtor = debt.visible_debtor();

        state.debts.push(debt);
        state.user_debts.entry(call.caller).or_default().push(id);
        state.events.append(
            at,
            debtor,
            EventPayload::DebtCreated {
                debt_id: id,
                debtor,
                term_days,
                is_anonymous,
            },
        );

        info!(debt_id = %id, debtor = %debtor, term_days, anonymous = is_anonymous, "debt created");
        Ok(id)
    }

    fn propose_restructuring(
        &self,
        call: &Call,
        debt_id: DebtId,
        new_amount: SealedValue,
        new_interest_rate: SealedValue,
        new_term_days: u32,
        reason: &str,
    ) -> Result<ProposalId, LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let debt_index = state.debt_index(debt_id)?;
        let debt = &state.debts[debt_index];
        if !debt.status.accepts_proposals() {
            return Err(LedgerError::DebtNotEligible {
                id: debt_id,
                status: debt.status,
            });
        }
        self.check_proposal_terms(&new_amount, &new_interest_rate, new_term_days, reason)?;

        let actor = visible_actor(debt, &call.caller);
        let id = state.next_proposal_id();
        state.proposals.push(RestructuringProposal {
            id,
            debt_id,
            proposer: call.caller,
            new_amount,
            new_interest_rate,
            new_term_days,
            proposed_at: at,
            decided_at: None,
            executed_at: None,
            status: ProposalStatus::Pending,
            creditor_approval: false,
            debtor_approval: false,
            reason: reason.to_string(),
        });
        state.user_proposals.entry(call.caller).or_default().push(id);
        state.debt_proposals.entry(debt_id).or_default().push(id);
        state.events.append(
            at,
            actor,
            EventPayload::ProposalCreated {
                proposal_id: id,
                debt_id,
                new_term_days,
            },
        );

        let debt = &mut state.debts[debt_index];
        let from = debt.status;
        if from != DebtStatus::Restructuring {
            debt.status = DebtStatus::Restructuring;
            debt.updated_at = at;
            state.events.append(
                at,
                actor,
                EventPayload::DebtStatusChanged {
                    debt_id,
                    from,
                    to: DebtStatus::Restructuring,
                },
            );
        }

        info!(proposal_id = %id, debt_id = %debt_id, caller = %actor, new_term_days, "restructuring proposed");
        Ok(id)
    }

    fn approve_proposal(
        &self,
        call: &Call,
        proposal_id: ProposalId,
        approve: bool,
    ) -> Result<ProposalStatus, LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let proposal_index = state.proposal_index(proposal_id)?;
        let debt_id = state.proposals[proposal_index].debt_id;
        let debt_index = state.debt_index(debt_id)?;

        let debt = &state.debts[debt_index];
        let is_debtor = debt.debtor == call.caller;
        let is_creditor = state.access.is_creditor(&call.caller);
        if !is_debtor && !is_creditor {
            return Err(LedgerError::unauthorized(format!(
                "only the debtor of {debt_id} or an authorized creditor may vote"
            )));
        }

        let proposal = &state.proposals[proposal_index];
        let outcome = if approve {
            ProposalStatus::Accepted
        } else {
            ProposalStatus::Rejected
        };
        if !proposal.status.can_transition_to(outcome) {
            return Err(LedgerError::ProposalNotPending {
                id: proposal_id,
                status: proposal.status,
            });
        }
        let role = match (is_debtor, is_creditor) {
            (true, true) if !proposal.debtor_approval => VoteRole::Debtor,
            (true, false) => VoteRole::Debtor,
            _ => VoteRole::Creditor,
        };
        if proposal.has_voted(role) {
            return Err(LedgerError::AlreadyApproved {
                id: proposal_id,
                role: role.as_str(),
            });
        }

        let actor = visible_actor(debt, &call.caller);
        state.events.append(
            at,
            actor,
            EventPayload::ProposalVoted {
                proposal_id,
                role,
                approve,
            },
        );

        let proposal = &mut state.proposals[proposal_index];
        if approve {
            match role {
                VoteRole::Debtor => proposal.debtor_approval = true,
                VoteRole::Creditor => proposal.creditor_approval = true,
            }
            if proposal.fully_approved() {
                proposal.status = ProposalStatus::Accepted;
                proposal.decided_at = Some(at);
                state.events.append(
                    at,
                    actor,
                    EventPayload::ProposalStatusChanged {
                        proposal_id,
                        from: ProposalStatus::Pending,
                        to: ProposalStatus::Accepted,
                    },
                );
                info!(proposal_id = %proposal_id, debt_id = %debt_id, "proposal accepted");
            }
        } else {
            proposal.status = ProposalStatus::Rejected;
            proposal.decided_at = Some(at);
            state.events.append(
                at,
                actor,
                EventPayload::ProposalStatusChanged {
                    proposal_id,
                    from: ProposalStatus::Pending,
                    to: ProposalStatus::Rejected,
                },
            );

            let debt = &mut state.debts[debt_index];
            if debt.status == DebtStatus::Restructuring {
                debt.status = DebtStatus::Active;
                debt.updated_at = at;
                state.events.append(
                    at,
                    actor,
                    EventPayload::DebtStatusChanged {
                        debt_id,
                        from: DebtStatus::Restructuring,
                        to: DebtStatus::Active,
                    },
                );
            }
            info!(proposal_id = %proposal_id, debt_id = %debt_id, role = %role, "proposal rejected");
        }

        let status = state.proposals[proposal_index].status;
        debug!(proposal_id = %proposal_id, caller = %actor, role = %role, approve, status = %status, "vote recorded");
        Ok(status)
    }

    fn execute_proposal(&self, call: &Call, proposal_id: ProposalId) -> Result<(), LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let proposal_index = state.proposal_index(proposal_id)?;
        let debt_id = state.proposals[proposal_index].debt_id;
        let debt_index = state.debt_index(debt_id)?;

        let debt = &state.debts[debt_index];
        let is_party = debt.debtor == call.caller || state.access.is_platform_role(&call.caller);
        if self.config.restrict_execution && !is_party {
            return Err(LedgerError::unauthorized(format!(
                "only the debtor of {debt_id}, a creditor, or the owner may execute"
            )));
        }

        let proposal = &state.proposals[proposal_index];
        if !proposal.status.can_transition_to(ProposalStatus::Executed) {
            return Err(LedgerError::ProposalNotAccepted {
                id: proposal_id,
                status: proposal.status,
            });
        }
        if debt.status.is_terminal() {
            return Err(LedgerError::DebtNotEligible {
                id: debt_id,
                status: debt.status,
            });
        }

        let actor = visible_actor(debt, &call.caller);
        let proposal = &mut state.proposals[proposal_index];
        proposal.status = ProposalStatus::Executed;
        proposal.executed_at = Some(at);
        let new_term_days = proposal.new_term_days;

        let debt = &mut state.debts[debt_index];
        debt.amount = proposal.new_amount.clone();
        debt.interest_rate = proposal.new_interest_rate.clone();
        debt.remaining_term_days = new_term_days;
        debt.refresh_data_hash();
        debt.updated_at = at;
        let from = debt.status;
        debt.status = DebtStatus::Active;

        state.events.append(
            at,
            actor,
            EventPayload::ProposalExecuted {
                proposal_id,
                debt_id,
                new_term_days,
            },
        );
        state.events.append(
            at,
            actor,
            EventPayload::ProposalStatusChanged {
                proposal_id,
                from: ProposalStatus::Accepted,
                to: ProposalStatus::Executed,
            },
        );
        if from != DebtStatus::Active {
            state.events.append(
                at,
                actor,
                EventPayload::DebtStatusChanged {
                    debt_id,
                    from,
                    to: DebtStatus::Active,
                },
            );
        }

        if !is_party {
            debug!(proposal_id = %proposal_id, caller = %actor, "executed by a non-party caller");
        }
        info!(proposal_id = %proposal_id, debt_id = %debt_id, new_term_days, "proposal executed");
        Ok(())
    }

    fn mark_debt_resolved(&self, call: &Call, debt_id: DebtId) -> Result<(), LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let debt_index = state.debt_index(debt_id)?;
        let debt = &mut state.debts[debt_index];
        if debt.debtor != call.caller {
            return Err(LedgerError::unauthorized(format!(
                "only the debtor may resolve {debt_id}"
            )));
        }
        if debt.status != DebtStatus::Active {
            return Err(LedgerError::DebtNotActive {
                id: debt_id,
                status: debt.status,
            });
        }

        let actor = visible_actor(debt, &call.caller);
        debt.status = DebtStatus::Resolved;
        debt.remaining_term_days = 0;
        debt.refresh_data_hash();
        debt.updated_at = at;
        state.events.append(
            at,
            actor,
            EventPayload::DebtStatusChanged {
                debt_id,
                from: DebtStatus::Active,
                to: DebtStatus::Resolved,
            },
        );

        info!(debt_id = %debt_id, "debt resolved");
        Ok(())
    }

    fn mark_debt_defaulted(&self, call: &Call, debt_id: DebtId) -> Result<(), LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let debt_index = state.debt_index(debt_id)?;
        if !state.access.is_platform_role(&call.caller) {
            return Err(LedgerError::unauthorized(
                "only the owner or an authorized creditor may mark a default",
            ));
        }
        let debt = &mut state.debts[debt_index];
        if !debt.status.can_transition_to(DebtStatus::Defaulted) {
            return Err(LedgerError::DebtNotEligible {
                id: debt_id,
                status: debt.status,
            });
        }

        let actor = visible_actor(debt, &call.caller);
        let from = debt.status;
        debt.status = DebtStatus::Defaulted;
        debt.updated_at = at;
        state.events.append(
            at,
            actor,
            EventPayload::DebtStatusChanged {
                debt_id,
                from,
                to: DebtStatus::Defaulted,
            },
        );

        info!(debt_id = %debt_id, caller = %actor, "debt defaulted");
        Ok(())
    }

    fn grant_read_access(
        &self,
        call: &Call,
        debt_id: DebtId,
        reader: AccountId,
    ) -> Result<(), LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let debt = state.debt(debt_id)?;
        if debt.debtor != call.caller {
            return Err(LedgerError::unauthorized(format!(
                "only the debtor may grant read access to {debt_id}"
            )));
        }
        let actor = visible_actor(debt, &call.caller);

        if state.access.grant_read(debt_id, reader) {
            state.events.append(
                at,
                actor,
                EventPayload::ReadAccessChanged {
                    debt_id,
                    reader,
                    granted: true,
                },
            );
            info!(debt_id = %debt_id, reader = %reader, "read access granted");
        }
        Ok(())
    }

    fn revoke_read_access(
        &self,
        call: &Call,
        debt_id: DebtId,
        reader: AccountId,
    ) -> Result<(), LedgerError> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let at = state.events.clamp(call.at);
        let debt = state.debt(debt_id)?;
        if debt.debtor != call.caller {
            return Err(LedgerError::unauthorized(format!(
                "only the debtor may revoke read access to {debt_id}"
            )));
        }
        let actor = visible_actor(debt, &call.caller);

        if state.access.revoke_read(debt_id, &reader) {
            state.events.append(
                at,
                actor,
                EventPayload::ReadAccessChanged {
                    debt_id,
                    reader,
                    granted: false,
                },
            );
            info!(debt_id = %debt_id, reader = %reader, "read access revoked");
        }
        Ok(())
    }
}

impl DebtReader for DebtLedger {
    fn debt_info(&self, viewer: &AccountId, debt_id: DebtId) -> Result<DebtView, LedgerError> {
        let state = self.read_state()?;
        let debt = state.debt(debt_id)?;
        if !state.access.can_read(viewer, debt, self.config.read_policy) {
            return Err(LedgerError::AccessDenied(debt_id.to_string()));
        }
        Ok(debt.view())
    }

    fn proposal_info(
        &self,
        viewer: &AccountId,
        proposal_id: ProposalId,
    ) -> Result<ProposalView, LedgerError> {
        let state = self.read_state()?;
        let proposal = state.proposal(proposal_id)?;
        let debt = state.debt(proposal.debt_id)?;
        if !state.access.can_read(viewer, debt, self.config.read_policy) {
            return Err(LedgerError::AccessDenied(proposal_id.to_string()));
        }
        let redact = debt.is_anonymous && proposal.proposer == debt.debtor;
        Ok(proposal.view(redact))
    }

    fn user_debts(
        &self,
        viewer: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<DebtId>, LedgerError> {
        let state = self.read_state()?;
        self.check_index_access(&state, viewer, user)?;
        let ids = state.user_debts.get(user).cloned().unwrap_or_default();
        if Self::sees_anonymous(&state, viewer, user) {
            return Ok(ids);
        }
        Ok(ids
            .into_iter()
            .filter(|id| state.debt(*id).is_ok_and(|debt| !debt.is_anonymous))
            .collect())
    }

    fn user_proposals(
        &self,
        viewer: &AccountId,
        user: &AccountId,
    ) -> Result<Vec<ProposalId>, LedgerError> {
        let state = self.read_state()?;
        self.check_index_access(&state, viewer, user)?;
        let ids = state.user_proposals.get(user).cloned().unwrap_or_default();
        if Self::sees_anonymous(&state, viewer, user) {
            return Ok(ids);
        }
        Ok(ids
            .into_iter()
            .filter(|id| {
                state
                    .proposal(*id)
                    .and_then(|p| state.debt(p.debt_id))
                    .is_ok_and(|debt| !(debt.is_anonymous && debt.debtor == *user))
            })
            .collect())
    }

    fn proposals_for_debt(
        &self,
        viewer: &AccountId,
        debt_id: DebtId,
    ) -> Result<Vec<ProposalId>, LedgerError> {
        let state = self.read_state()?;
        let debt = state.debt(debt_id)?;
        if !state.access.can_read(viewer, debt, self.config.read_policy) {
            return Err(LedgerError::AccessDenied(debt_id.to_string()));
        }
        Ok(state
            .debt_proposals
            .get(&debt_id)
            .cloned()
            .unwrap_or_default())
    }

    fn debt_count(&self) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.debts.len() as u64)
    }

    fn proposal_count(&self) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.proposals.len() as u64)
    }

    fn owner(&self) -> Result<AccountId, LedgerError> {
        Ok(self.read_state()?.access.owner())
    }

    fn is_authorized_creditor(&self, who: &AccountId) -> Result<bool, LedgerError> {
        Ok(self.read_state()?.access.is_creditor(who))
    }

    fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let state = self.read_state()?;
        let mut stats = LedgerStats::collect(&state.debts, &state.proposals);
        stats.authorized_creditors = state.access.creditors().count() as u64;
        stats.event_count = state.events.len() as u64;
        Ok(stats)
    }

    fn events_since(&self, from_seq: u64) -> Result<Vec<LedgerEvent>, LedgerError> {
        Ok(self.read_state()?.events.since(from_seq).to_vec())
    }
}
