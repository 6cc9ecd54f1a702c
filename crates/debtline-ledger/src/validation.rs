use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use debtline_types::{AccountId, DebtId, DebtStatus, ProposalId, ProposalStatus};
use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::event::{EventPayload, LedgerEvent};
use crate::records::{DebtRecord, RestructuringProposal};

/// Result of an integrity check over a ledger's records and event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub debt_count: u64,
    pub proposal_count: u64,
    pub event_count: u64,
    pub hash_chain_valid: bool,
    pub sequence_monotonic: bool,
    pub records_consistent: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Event sequence number, or 0 for record violations.
    pub seq: u64,
    /// What the violation is about, e.g. `event 4` or `debt#2`.
    pub subject: String,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    TimeRegression,
    IdGap,
    DataHashMismatch,
    DanglingProposal,
    ApprovalMismatch,
    /// Stored status, creditor list, or read grants disagree with the
    /// state the event log replays to.
    StateMismatch,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Integrity validator over ledger contents.
pub struct LedgerValidator;

impl LedgerValidator {
    /// Check records, role state, and events together.
    pub fn validate(
        access: &AccessControl,
        debts: &[DebtRecord],
        proposals: &[RestructuringProposal],
        events: &[LedgerEvent],
    ) -> ValidationReport {
        let event_violations = Self::validate_events(events);
        let mut record_violations = Self::validate_records(debts, proposals);
        record_violations.extend(Self::validate_state(access, debts, proposals, events));

        let hash_chain_valid = !event_violations.iter().any(|v| {
            matches!(
                v.kind,
                ViolationKind::HashChainBreak | ViolationKind::HashMismatch
            )
        });
        let sequence_monotonic = !event_violations.iter().any(|v| {
            matches!(
                v.kind,
                ViolationKind::SequenceGap | ViolationKind::TimeRegression
            )
        });

        let mut violations = event_violations;
        let records_consistent = record_violations.is_empty();
        violations.extend(record_violations);

        ValidationReport {
            debt_count: debts.len() as u64,
            proposal_count: proposals.len() as u64,
            event_count: events.len() as u64,
            hash_chain_valid,
            sequence_monotonic,
            records_consistent,
            violations,
        }
    }

    /// Sequence numbers, prev-hash links, event hashes, and timestamps.
    pub fn validate_events(events: &[LedgerEvent]) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (index, event) in events.iter().enumerate() {
            let subject = format!("event {}", event.seq);
            let expected_seq = (index + 1) as u64;
            if event.seq != expected_seq {
                violations.push(Violation {
                    seq: event.seq,
                    subject: subject.clone(),
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", event.seq),
                });
            }

            let previous = index.checked_sub(1).map(|i| &events[i]);
            if event.prev_hash != previous.map(|p| p.hash) {
                violations.push(Violation {
                    seq: event.seq,
                    subject: subject.clone(),
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            if !event.verify_hash() {
                violations.push(Violation {
                    seq: event.seq,
                    subject: subject.clone(),
                    kind: ViolationKind::HashMismatch,
                    description: "event hash does not match computed".into(),
                });
            }

            if let Some(previous) = previous {
                if event.timestamp < previous.timestamp {
                    violations.push(Violation {
                        seq: event.seq,
                        subject,
                        kind: ViolationKind::TimeRegression,
                        description: format!(
                            "timestamp {} precedes {}",
                            event.timestamp, previous.timestamp
                        ),
                    });
                }
            }
        }

        violations
    }

    /// Id sequences, debt data hashes, proposal parents, and approval flags.
    pub fn validate_records(
        debts: &[DebtRecord],
        proposals: &[RestructuringProposal],
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (index, debt) in debts.iter().enumerate() {
            let expected = (index + 1) as u64;
            if debt.id.get() != expected {
                violations.push(Violation {
                    seq: 0,
                    subject: debt.id.to_string(),
                    kind: ViolationKind::IdGap,
                    description: format!("expected debt#{expected}"),
                });
            }
            if !debt.verify_data_hash() {
                violations.push(Violation {
                    seq: 0,
                    subject: debt.id.to_string(),
                    kind: ViolationKind::DataHashMismatch,
                    description: "stored data hash does not match amount, rate, and terms".into(),
                });
            }
        }

        for (index, proposal) in proposals.iter().enumerate() {
            let subject = proposal.id.to_string();
            let expected = (index + 1) as u64;
            if proposal.id.get() != expected {
                violations.push(Violation {
                    seq: 0,
                    subject: subject.clone(),
                    kind: ViolationKind::IdGap,
                    description: format!("expected proposal#{expected}"),
                });
            }

            let parent = proposal.debt_id.get();
            if parent == 0 || parent > debts.len() as u64 {
                violations.push(Violation {
                    seq: 0,
                    subject: subject.clone(),
                    kind: ViolationKind::DanglingProposal,
                    description: format!("references missing {}", proposal.debt_id),
                });
            }

            let needs_both = matches!(
                proposal.status,
                ProposalStatus::Accepted | ProposalStatus::Executed
            );
            if needs_both != proposal.fully_approved() && proposal.status != ProposalStatus::Rejected
            {
                violations.push(Violation {
                    seq: 0,
                    subject,
                    kind: ViolationKind::ApprovalMismatch,
                    description: format!(
                        "status {} with debtor={} creditor={}",
                        proposal.status, proposal.debtor_approval, proposal.creditor_approval
                    ),
                });
            }
        }

        violations
    }

    /// Replay the event log and compare the resulting statuses, creditor
    /// list, and read grants with what is stored.
    pub fn validate_state(
        access: &AccessControl,
        debts: &[DebtRecord],
        proposals: &[RestructuringProposal],
        events: &[LedgerEvent],
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let replayed = Replay::run(access.owner(), events, &mut violations);

        for debt in debts {
            match replayed.debts.get(&debt.id) {
                Some(status) if *status == debt.status => {}
                Some(status) => violations.push(mismatch(
                    debt.id.to_string(),
                    format!("stored status {}, event log says {status}", debt.status),
                )),
                None => violations.push(mismatch(
                    debt.id.to_string(),
                    "no creation event".into(),
                )),
            }
        }

        for proposal in proposals {
            match replayed.proposals.get(&proposal.id) {
                Some(status) if *status == proposal.status => {}
                Some(status) => violations.push(mismatch(
                    proposal.id.to_string(),
                    format!("stored status {}, event log says {status}", proposal.status),
                )),
                None => violations.push(mismatch(
                    proposal.id.to_string(),
                    "no creation event".into(),
                )),
            }
            if proposal.status.is_terminal() && proposal.decided_at.is_none() {
                violations.push(mismatch(
                    proposal.id.to_string(),
                    format!("{} without a decision time", proposal.status),
                ));
            }
        }

        let stored: BTreeSet<AccountId> = access.creditors().copied().collect();
        for creditor in stored.symmetric_difference(&replayed.creditors) {
            let state = if stored.contains(creditor) {
                "listed but never authorized"
            } else {
                "authorized but missing"
            };
            violations.push(mismatch("creditors".into(), format!("{creditor} {state}")));
        }

        let debt_ids: BTreeSet<DebtId> = debts
            .iter()
            .map(|d| d.id)
            .chain(replayed.read_grants.keys().copied())
            .chain(access.granted_debts())
            .collect();
        for debt_id in debt_ids {
            let stored: BTreeSet<AccountId> = access.readers(debt_id).into_iter().collect();
            let expected = replayed.read_grants.get(&debt_id).cloned().unwrap_or_default();
            if stored != expected {
                violations.push(mismatch(
                    debt_id.to_string(),
                    format!(
                        "{} stored read grants, event log grants {}",
                        stored.len(),
                        expected.len()
                    ),
                ));
            }
        }

        violations
    }
}

fn mismatch(subject: String, description: String) -> Violation {
    Violation {
        seq: 0,
        subject,
        kind: ViolationKind::StateMismatch,
        description,
    }
}

/// State rebuilt from events alone.
struct Replay {
    debts: BTreeMap<DebtId, DebtStatus>,
    proposals: BTreeMap<ProposalId, ProposalStatus>,
    creditors: BTreeSet<AccountId>,
    read_grants: BTreeMap<DebtId, BTreeSet<AccountId>>,
}

impl Replay {
    /// Transitions that the status machines do not allow are reported
    /// against the event that claims them.
    fn run(owner: AccountId, events: &[LedgerEvent], violations: &mut Vec<Violation>) -> Self {
        let mut replay = Self {
            debts: BTreeMap::new(),
            proposals: BTreeMap::new(),
            creditors: BTreeSet::from([owner]),
            read_grants: BTreeMap::new(),
        };
        let mut illegal = |event: &LedgerEvent, description: String| {
            violations.push(Violation {
                seq: event.seq,
                subject: format!("event {}", event.seq),
                kind: ViolationKind::StateMismatch,
                description,
            });
        };

        for event in events {
            match &event.payload {
                EventPayload::CreditorAuthorizationChanged {
                    creditor,
                    authorized,
                } => {
                    if *authorized {
                        replay.creditors.insert(*creditor);
                    } else {
                        replay.creditors.remove(creditor);
                    }
                }
                EventPayload::DebtCreated { debt_id, .. } => {
                    replay.debts.insert(*debt_id, DebtStatus::Active);
                }
                EventPayload::DebtStatusChanged { debt_id, from, to } => {
                    match replay.debts.get_mut(debt_id) {
                        Some(status) if *status == *from && from.can_transition_to(*to) => {
                            *status = *to;
                        }
                        Some(status) => {
                            illegal(event, format!("{debt_id} {from} -> {to} while {status}"));
                            *status = *to;
                        }
                        None => illegal(event, format!("{debt_id} changed before creation")),
                    }
                }
                EventPayload::ProposalCreated { proposal_id, .. } => {
                    replay.proposals.insert(*proposal_id, ProposalStatus::Pending);
                }
                EventPayload::ProposalStatusChanged {
                    proposal_id,
                    from,
                    to,
                } => match replay.proposals.get_mut(proposal_id) {
                    Some(status) if *status == *from && from.can_transition_to(*to) => {
                        *status = *to;
                    }
                    Some(status) => {
                        illegal(event, format!("{proposal_id} {from} -> {to} while {status}"));
                        *status = *to;
                    }
                    None => illegal(event, format!("{proposal_id} changed before creation")),
                },
                EventPayload::ReadAccessChanged {
                    debt_id,
                    reader,
                    granted,
                } => {
                    if *granted {
                        replay.read_grants.entry(*debt_id).or_default().insert(*reader);
                    } else if let Some(readers) = replay.read_grants.get_mut(debt_id) {
                        readers.remove(reader);
                        if readers.is_empty() {
                            replay.read_grants.remove(debt_id);
                        }
                    }
                }
                EventPayload::ProposalVoted { .. } | EventPayload::ProposalExecuted { .. } => {}
            }
        }
        replay
    }
}

#[cfg(test)]
mod tests {
    use debtline_types::{AccountId, DebtId, DebtStatus, ProposalId, SealedValue, Timestamp};

    use super::*;
    use crate::event::{EventLog, EventPayload};

    fn log(n: u64) -> EventLog {
        let mut log = EventLog::new();
        for i in 1..=n {
            log.append(
                Timestamp::from_secs(i * 10),
                AccountId::from_label("actor"),
                EventPayload::CreditorAuthorizationChanged {
                    creditor: AccountId::from_label("bank"),
                    authorized: i % 2 == 1,
                },
            );
        }
        log
    }

    fn debt(id: u64) -> DebtRecord {
        let mut debt = DebtRecord {
            id: DebtId::new(id).unwrap(),
            debtor: AccountId::from_label("debtor"),
            amount: SealedValue::from_bytes(vec![0, 0, 0, 0, 0, 0, 3, 232]),
            interest_rate: SealedValue::from_bytes(vec![0, 0, 0, 0, 0, 0, 1, 244]),
            original_term_days: 365,
            remaining_term_days: 365,
            created_at: Timestamp::from_secs(1),
            updated_at: Timestamp::from_secs(1),
            status: DebtStatus::Active,
            is_anonymous: false,
            data_hash: [0; 32],
        };
        debt.refresh_data_hash();
        debt
    }

    fn proposal(id: u64, debt_id: u64, status: ProposalStatus) -> RestructuringProposal {
        let approved = matches!(status, ProposalStatus::Accepted | ProposalStatus::Executed);
        RestructuringProposal {
            id: ProposalId::new(id).unwrap(),
            debt_id: DebtId::new(debt_id).unwrap(),
            proposer: AccountId::from_label("debtor"),
            new_amount: SealedValue::default(),
            new_interest_rate: SealedValue::default(),
            new_term_days: 730,
            proposed_at: Timestamp::from_secs(2),
            decided_at: (status != ProposalStatus::Pending).then(|| Timestamp::from_secs(3)),
            executed_at: None,
            status,
            creditor_approval: approved,
            debtor_approval: approved,
            reason: "relief".into(),
        }
    }

    fn owner() -> AccountId {
        AccountId::from_label("owner")
    }

    /// Two debts: debt#1 restructuring under a pending proposal, debt#2
    /// back to active after an executed one. `bank` is a creditor and
    /// `auditor` may read debt#2.
    fn history() -> (AccessControl, Vec<DebtRecord>, Vec<RestructuringProposal>, EventLog) {
        let mut access = AccessControl::new(owner());
        access.set_creditor(AccountId::from_label("bank"), true);
        access.grant_read(DebtId::new(2).unwrap(), AccountId::from_label("auditor"));

        let mut first = debt(1);
        first.status = DebtStatus::Restructuring;
        let debts = vec![first, debt(2)];
        let proposals = vec![
            proposal(1, 1, ProposalStatus::Pending),
            proposal(2, 2, ProposalStatus::Executed),
        ];

        let d1 = DebtId::new(1).unwrap();
        let d2 = DebtId::new(2).unwrap();
        let p1 = ProposalId::new(1).unwrap();
        let p2 = ProposalId::new(2).unwrap();
        let payloads = vec![
            EventPayload::CreditorAuthorizationChanged {
                creditor: AccountId::from_label("bank"),
                authorized: true,
            },
            EventPayload::DebtCreated {
                debt_id: d1,
                debtor: AccountId::from_label("debtor"),
                term_days: 365,
                is_anonymous: false,
            },
            EventPayload::DebtCreated {
                debt_id: d2,
                debtor: AccountId::from_label("debtor"),
                term_days: 365,
                is_anonymous: false,
            },
            EventPayload::ReadAccessChanged {
                debt_id: d2,
                reader: AccountId::from_label("auditor"),
                granted: true,
            },
            EventPayload::ProposalCreated {
                proposal_id: p1,
                debt_id: d1,
                new_term_days: 730,
            },
            EventPayload::DebtStatusChanged {
                debt_id: d1,
                from: DebtStatus::Active,
                to: DebtStatus::Restructuring,
            },
            EventPayload::ProposalCreated {
                proposal_id: p2,
                debt_id: d2,
                new_term_days: 730,
            },
            EventPayload::DebtStatusChanged {
                debt_id: d2,
                from: DebtStatus::Active,
                to: DebtStatus::Restructuring,
            },
            EventPayload::ProposalStatusChanged {
                proposal_id: p2,
                from: ProposalStatus::Pending,
                to: ProposalStatus::Accepted,
            },
            EventPayload::ProposalExecuted {
                proposal_id: p2,
                debt_id: d2,
                new_term_days: 730,
            },
            EventPayload::ProposalStatusChanged {
                proposal_id: p2,
                from: ProposalStatus::Accepted,
                to: ProposalStatus::Executed,
            },
            EventPayload::DebtStatusChanged {
                debt_id: d2,
                from: DebtStatus::Restructuring,
                to: DebtStatus::Active,
            },
        ];
        let mut events = EventLog::new();
        for (i, payload) in payloads.into_iter().enumerate() {
            events.append(Timestamp::from_secs(i as u64 + 1), owner(), payload);
        }
        (access, debts, proposals, events)
    }

    #[test]
    fn clean_ledger_is_valid() {
        let (access, debts, proposals, events) = history();
        let report = LedgerValidator::validate(&access, &debts, &proposals, events.events());
        assert!(report.is_valid(), "{:?}", report.violations);
        assert!(report.hash_chain_valid);
        assert!(report.sequence_monotonic);
        assert!(report.records_consistent);
        assert_eq!(report.event_count, 12);
        assert_eq!(report.debt_count, 2);
    }

    #[test]
    fn stored_status_must_match_the_log() {
        let (access, mut debts, mut proposals, events) = history();
        debts[1].status = DebtStatus::Defaulted;
        proposals[0].status = ProposalStatus::Rejected;
        let violations =
            LedgerValidator::validate_state(&access, &debts, &proposals, events.events());
        let subjects: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::StateMismatch)
            .map(|v| v.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["debt#2", "proposal#1", "proposal#1"]);
    }

    #[test]
    fn stored_roles_must_match_the_log() {
        let (mut access, debts, proposals, events) = history();
        access.set_creditor(AccountId::from_label("mallory"), true);
        access.set_creditor(AccountId::from_label("bank"), false);
        access.grant_read(DebtId::FIRST, AccountId::from_label("mallory"));
        let report = LedgerValidator::validate(&access, &debts, &proposals, events.events());
        assert!(!report.records_consistent);
        assert!(report.hash_chain_valid);
        let subjects: Vec<_> = report.violations.iter().map(|v| v.subject.as_str()).collect();
        assert_eq!(subjects, vec!["creditors", "creditors", "debt#1"]);
    }

    #[test]
    fn illegal_transition_in_log_is_reported() {
        let (access, mut debts, _, _) = history();
        let mut events = EventLog::new();
        events.append(
            Timestamp::from_secs(1),
            owner(),
            EventPayload::CreditorAuthorizationChanged {
                creditor: AccountId::from_label("bank"),
                authorized: true,
            },
        );
        events.append(
            Timestamp::from_secs(2),
            owner(),
            EventPayload::DebtCreated {
                debt_id: DebtId::FIRST,
                debtor: AccountId::from_label("debtor"),
                term_days: 365,
                is_anonymous: false,
            },
        );
        for (from, to) in [
            (DebtStatus::Active, DebtStatus::Defaulted),
            (DebtStatus::Defaulted, DebtStatus::Active),
        ] {
            events.append(
                Timestamp::from_secs(3),
                owner(),
                EventPayload::DebtStatusChanged {
                    debt_id: DebtId::FIRST,
                    from,
                    to,
                },
            );
        }
        debts.truncate(1);
        debts[0].status = DebtStatus::Active;
        let violations = LedgerValidator::validate_state(&access, &debts, &[], events.events());
        assert_eq!(violations.len(), 2, "{violations:?}");
        assert_eq!(violations[0].seq, 4);
        assert_eq!(violations[0].kind, ViolationKind::StateMismatch);
        // Read grant on a debt that the log never created.
        assert_eq!(violations[1].subject, "debt#2");
    }

    #[test]
    fn tampered_payload_is_a_hash_mismatch() {
        let mut events = log(3).events().to_vec();
        events[1].payload = EventPayload::CreditorAuthorizationChanged {
            creditor: AccountId::from_label("mallory"),
            authorized: true,
        };
        let violations = LedgerValidator::validate_events(&events);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::HashMismatch);
        assert_eq!(violations[0].subject, "event 2");
    }

    #[test]
    fn dropped_event_breaks_sequence_and_chain() {
        let mut events = log(3).events().to_vec();
        events.remove(1);
        let kinds: Vec<_> = LedgerValidator::validate_events(&events)
            .into_iter()
            .map(|v| v.kind)
            .collect();
        assert!(kinds.contains(&ViolationKind::SequenceGap));
        assert!(kinds.contains(&ViolationKind::HashChainBreak));
    }

    #[test]
    fn backdated_event_is_a_time_regression() {
        let mut events = log(1).events().to_vec();
        events.push(LedgerEvent::new(
            2,
            Timestamp::from_secs(1),
            AccountId::ZERO,
            EventPayload::ReadAccessChanged {
                debt_id: DebtId::FIRST,
                reader: AccountId::from_label("auditor"),
                granted: true,
            },
            Some(events[0].hash),
        ));
        let report =
            LedgerValidator::validate(&AccessControl::new(owner()), &[], &[], &events);
        assert!(!report.sequence_monotonic);
        assert!(report.hash_chain_valid);
    }

    #[test]
    fn record_checks() {
        let mut tampered = debt(2);
        tampered.remaining_term_days = 9999;
        let violations = LedgerValidator::validate_records(
            &[debt(1), tampered],
            &[
                proposal(1, 7, ProposalStatus::Pending),
                proposal(3, 1, ProposalStatus::Pending),
            ],
        );
        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::DataHashMismatch,
                ViolationKind::DanglingProposal,
                ViolationKind::IdGap,
            ]
        );
    }

    #[test]
    fn accepted_without_both_votes_is_inconsistent() {
        let mut accepted = proposal(1, 1, ProposalStatus::Accepted);
        accepted.creditor_approval = false;
        let violations = LedgerValidator::validate_records(&[debt(1)], &[accepted]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ApprovalMismatch);
    }
}
