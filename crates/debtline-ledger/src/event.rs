use std::fmt;

use debtline_crypto::ContentHasher;
use debtline_types::{AccountId, DebtId, DebtStatus, ProposalId, ProposalStatus, Timestamp};
use serde::{Deserialize, Serialize};

use crate::records::VoteRole;

/// Classification of ledger events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    CreditorAuthorizationChanged,
    DebtCreated,
    DebtStatusChanged,
    ProposalCreated,
    ProposalVoted,
    ProposalStatusChanged,
    ProposalExecuted,
    ReadAccessChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreditorAuthorizationChanged => "CreditorAuthorizationChanged",
            Self::DebtCreated => "DebtCreated",
            Self::DebtStatusChanged => "DebtStatusChanged",
            Self::ProposalCreated => "ProposalCreated",
            Self::ProposalVoted => "ProposalVoted",
            Self::ProposalStatusChanged => "ProposalStatusChanged",
            Self::ProposalExecuted => "ProposalExecuted",
            Self::ReadAccessChanged => "ReadAccessChanged",
        };
        write!(f, "{s}")
    }
}

/// What happened. Identities of anonymous debtors are already redacted
/// by the time a payload is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    CreditorAuthorizationChanged {
        creditor: AccountId,
        authorized: bool,
    },
    DebtCreated {
        debt_id: DebtId,
        debtor: AccountId,
        term_days: u32,
        is_anonymous: bool,
    },
    DebtStatusChanged {
        debt_id: DebtId,
        from: DebtStatus,
        to: DebtStatus,
    },
    ProposalCreated {
        proposal_id: ProposalId,
        debt_id: DebtId,
        new_term_days: u32,
    },
    ProposalVoted {
        proposal_id: ProposalId,
        role: VoteRole,
        approve: bool,
    },
    ProposalStatusChanged {
        proposal_id: ProposalId,
        from: ProposalStatus,
        to: ProposalStatus,
    },
    ProposalExecuted {
        proposal_id: ProposalId,
        debt_id: DebtId,
        new_term_days: u32,
    },
    ReadAccessChanged {
        debt_id: DebtId,
        reader: AccountId,
        granted: bool,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CreditorAuthorizationChanged { .. } => EventKind::CreditorAuthorizationChanged,
            Self::DebtCreated { .. } => EventKind::DebtCreated,
            Self::DebtStatusChanged { .. } => EventKind::DebtStatusChanged,
            Self::ProposalCreated { .. } => EventKind::ProposalCreated,
            Self::ProposalVoted { .. } => EventKind::ProposalVoted,
            Self::ProposalStatusChanged { .. } => EventKind::ProposalStatusChanged,
            Self::ProposalExecuted { .. } => EventKind::ProposalExecuted,
            Self::ReadAccessChanged { .. } => EventKind::ReadAccessChanged,
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            Self::CreditorAuthorizationChanged {
                creditor,
                authorized,
            } => format!(
                "creditor {creditor} {}",
                if *authorized { "authorized" } else { "deauthorized" }
            ),
            Self::DebtCreated {
                debt_id,
                debtor,
                term_days,
                is_anonymous,
            } => format!(
                "{debt_id} created by {} for {term_days} days",
                if *is_anonymous {
                    "anonymous".to_string()
                } else {
                    debtor.to_string()
                }
            ),
            Self::DebtStatusChanged { debt_id, from, to } => format!("{debt_id} {from} -> {to}"),
            Self::ProposalCreated {
                proposal_id,
                debt_id,
                new_term_days,
            } => format!("{proposal_id} filed against {debt_id} for {new_term_days} days"),
            Self::ProposalVoted {
                proposal_id,
                role,
                approve,
            } => format!(
                "{role} voted {} on {proposal_id}",
                if *approve { "yes" } else { "no" }
            ),
            Self::ProposalStatusChanged {
                proposal_id,
                from,
                to,
            } => format!("{proposal_id} {from} -> {to}"),
            Self::ProposalExecuted {
                proposal_id,
                debt_id,
                new_term_days,
            } => format!("{proposal_id} applied to {debt_id}, term now {new_term_days} days"),
            Self::ReadAccessChanged {
                debt_id,
                reader,
                granted,
            } => format!(
                "read access to {debt_id} {} {reader}",
                if *granted { "granted to" } else { "revoked from" }
            ),
        }
    }
}

/// One entry in the ledger's append-only, hash-linked event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub timestamp: Timestamp,
    /// The caller, or [`AccountId::ZERO`] when the caller is an anonymous debtor.
    pub actor: AccountId,
    pub payload: EventPayload,
    #[serde(with = "crate::hex_digest::option")]
    pub prev_hash: Option<[u8; 32]>,
    #[serde(with = "crate::hex_digest")]
    pub hash: [u8; 32],
}

impl LedgerEvent {
    pub fn new(
        seq: u64,
        timestamp: Timestamp,
        actor: AccountId,
        payload: EventPayload,
        prev_hash: Option<[u8; 32]>,
    ) -> Self {
        let hash = Self::compute_hash(seq, &timestamp, &actor, &payload, prev_hash.as_ref());
        Self {
            seq,
            timestamp,
            actor,
            payload,
            prev_hash,
            hash,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn verify_hash(&self) -> bool {
        let expected = Self::compute_hash(
            self.seq,
            &self.timestamp,
            &self.actor,
            &self.payload,
            self.prev_hash.as_ref(),
        );
        expected == self.hash
    }

    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    fn compute_hash(
        seq: u64,
        timestamp: &Timestamp,
        actor: &AccountId,
        payload: &EventPayload,
        prev_hash: Option<&[u8; 32]>,
    ) -> [u8; 32] {
        let seq = seq.to_le_bytes();
        let time = timestamp.as_secs().to_le_bytes();
        let prev: &[u8] = prev_hash.map(|h| h.as_slice()).unwrap_or(&[]);
        // Payloads hold only integers, enums and fixed-size ids, none of
        // which bincode can fail to encode.
        let body = bincode::serialize(payload).unwrap_or_default();
        ContentHasher::EVENT.hash_parts(&[
            seq.as_slice(),
            time.as_slice(),
            actor.as_bytes().as_slice(),
            prev,
            body.as_slice(),
        ])
    }
}

/// Append-only event log. Each event links to its predecessor's hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the head of the log.
    ///
    /// Event time never runs backwards: a timestamp earlier than the head's
    /// is raised to the head's.
    pub fn append(
        &mut self,
        timestamp: Timestamp,
        actor: AccountId,
        payload: EventPayload,
    ) -> &LedgerEvent {
        let seq = self.events.len() as u64 + 1;
        let prev_hash = self.events.last().map(|e| e.hash);
        let timestamp = self.clamp(timestamp);
        let index = self.events.len();
        self.events
            .push(LedgerEvent::new(seq, timestamp, actor, payload, prev_hash));
        &self.events[index]
    }

    /// The time the next appended event will carry for `timestamp`.
    pub fn clamp(&self, timestamp: Timestamp) -> Timestamp {
        self.events
            .last()
            .map_or(timestamp, |head| head.timestamp.max(timestamp))
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn head(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events from `from_seq` onward (1-based, inclusive).
    pub fn since(&self, from_seq: u64) -> &[LedgerEvent] {
        let start = from_seq.saturating_sub(1) as usize;
        self.events.get(start..).unwrap_or(&[])
    }
}
