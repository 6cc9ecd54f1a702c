//! Foundation types for Debtline.
//!
//! This crate provides the identity, temporal, identifier, and status types
//! shared by every other Debtline crate.
//!
//! # Key Types
//!
//! - [`AccountId`]: 32-byte caller identity; the all-zero id is the redacted identity
//! - [`Timestamp`]: Transaction time in whole seconds since the UNIX epoch
//! - [`DebtId`] / [`ProposalId`]: Sequential identifiers starting at 1
//! - [`SealedValue`]: Opaque payload carrying an encrypted amount or rate
//! - [`DebtStatus`] / [`ProposalStatus`]: Lifecycle states with transition rules

pub mod error;
pub mod identity;
pub mod ids;
pub mod payload;
pub mod status;
pub mod temporal;

pub use error::TypeError;
pub use identity::{AccountId, IdentityMaterial};
pub use ids::{DebtId, ProposalId};
pub use payload::SealedValue;
pub use status::{DebtStatus, ProposalStatus};
pub use temporal::Timestamp;
