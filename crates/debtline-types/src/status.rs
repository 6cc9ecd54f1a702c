use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Lifecycle state of a debt record.
///
/// ```text
/// ACTIVE ──propose──▶ RESTRUCTURING ──reject/execute──▶ ACTIVE
///   │                      │
///   ├──resolve──▶ RESOLVED │
///   └──default──▶ DEFAULTED ◀──default──┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtStatus {
    Active,
    Restructuring,
    Resolved,
    Defaulted,
}

impl DebtStatus {
    pub const ALL: [DebtStatus; 4] = [
        Self::Active,
        Self::Restructuring,
        Self::Resolved,
        Self::Defaulted,
    ];

    /// RESOLVED and DEFAULTED admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Defaulted)
    }

    /// Whether new restructuring proposals may be filed against the debt.
    pub fn accepts_proposals(&self) -> bool {
        matches!(self, Self::Active | Self::Restructuring)
    }

    /// Whether moving from `self` to `next` is a defined transition.
    ///
    /// Self-loops on `Restructuring` are allowed because each additional
    /// proposal re-enters that state.
    pub fn can_transition_to(&self, next: DebtStatus) -> bool {
        use DebtStatus::*;
        matches!(
            (self, next),
            (Active, Restructuring)
                | (Active, Resolved)
                | (Active, Defaulted)
                | (Restructuring, Restructuring)
                | (Restructuring, Active)
                | (Restructuring, Defaulted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Restructuring => "RESTRUCTURING",
            Self::Resolved => "RESOLVED",
            Self::Defaulted => "DEFAULTED",
        }
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "RESTRUCTURING" => Ok(Self::Restructuring),
            "RESOLVED" => Ok(Self::Resolved),
            "DEFAULTED" => Ok(Self::Defaulted),
            _ => Err(TypeError::UnknownStatus(s.to_string())),
        }
    }
}

/// Lifecycle state of a restructuring proposal.
///
/// `PENDING → REJECTED`, or `PENDING → ACCEPTED → EXECUTED`. Nothing returns
/// to `PENDING`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Pending,
    #[serde(alias = "APPROVED")]
    Accepted,
    Rejected,
    Executed,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 4] = [
        Self::Pending,
        Self::Accepted,
        Self::Rejected,
        Self::Executed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Executed)
    }

    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Accepted, Executed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Executed => "EXECUTED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" | "APPROVED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            "EXECUTED" => Ok(Self::Executed),
            _ => Err(TypeError::UnknownStatus(s.to_string())),
        }
    }
}
