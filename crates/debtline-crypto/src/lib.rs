//! Cryptographic plumbing for Debtline.
//!
//! Provides domain-separated BLAKE3 hashing, the [`PayloadVerifier`]
//! capability the ledger uses to range-check sealed amounts and rates, and
//! [`Sealer`] implementations that turn plaintext numbers into
//! [`SealedValue`](debtline_types::SealedValue)s.
//!
//! The homomorphic encryption service of a production deployment is an
//! external collaborator; nothing here attempts to be one. The
//! [`KeystreamSealer`] exists so demos and tests have ciphertext-shaped
//! payloads to push through the ledger.

pub mod hasher;
pub mod sealer;
pub mod verifier;

pub use hasher::{ContentHasher, HasherError};
pub use sealer::{KeystreamSealer, PlaintextSealer, SealError, Sealer};
pub use verifier::{CiphertextVerifier, PayloadError, PayloadVerifier, PlaintextVerifier};
