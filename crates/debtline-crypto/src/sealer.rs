use debtline_types::SealedValue;

use crate::verifier::{PlaintextVerifier, PLAINTEXT_WIDTH};

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 32;
const SEALED_LEN: usize = NONCE_LEN + PLAINTEXT_WIDTH + TAG_LEN;

const STREAM_CONTEXT: &str = "debtline keystream sealer 2024-01 stream";
const TAG_CONTEXT: &str = "debtline keystream sealer 2024-01 tag";

/// Client-side conversion between plaintext numbers and sealed payloads.
pub trait Sealer: Send + Sync {
    fn seal(&self, value: u64) -> SealedValue;

    fn open(&self, sealed: &SealedValue) -> Result<u64, SealError>;
}

/// Errors from opening a sealed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealError {
    #[error("malformed sealed value: {0}")]
    Malformed(String),

    #[error("sealed value failed authentication")]
    TagMismatch,
}

/// Identity "sealer" for the plaintext deployment.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaintextSealer;

impl Sealer for PlaintextSealer {
    fn seal(&self, value: u64) -> SealedValue {
        PlaintextVerifier::encode(value)
    }

    fn open(&self, sealed: &SealedValue) -> Result<u64, SealError> {
        PlaintextVerifier::decode(sealed).map_err(|e| SealError::Malformed(e.to_string()))
    }
}

/// Placeholder sealer: BLAKE3 keystream XOR plus a keyed BLAKE3 tag.
///
/// Layout: `nonce (16) || masked value (8) || tag (32)`. It hides values
/// from casual inspection of the ledger and nothing more; the production
/// deployment delegates to an external FHE service.
#[derive(Clone)]
pub struct KeystreamSealer {
    stream_key: [u8; 32],
    tag_key: [u8; 32],
}

impl KeystreamSealer {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            stream_key: blake3::derive_key(STREAM_CONTEXT, &key),
            tag_key: blake3::derive_key(TAG_CONTEXT, &key),
        }
    }

    /// Fresh random key, returned so callers can persist it.
    pub fn generate() -> ([u8; 32], Self) {
        let mut key = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut key);
        (key, Self::new(key))
    }

    /// Length of every value this sealer produces.
    pub const fn sealed_len() -> usize {
        SEALED_LEN
    }

    fn keystream(&self, nonce: &[u8]) -> [u8; PLAINTEXT_WIDTH] {
        let mut stream = [0u8; PLAINTEXT_WIDTH];
        let mut hasher = blake3::Hasher::new_keyed(&self.stream_key);
        hasher.update(nonce);
        hasher.finalize_xof().fill(&mut stream);
        stream
    }

    fn tag(&self, nonce: &[u8], masked: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.tag_key);
        hasher.update(nonce);
        hasher.update(masked);
        hasher.finalize()
    }
}

impl std::fmt::Debug for KeystreamSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeystreamSealer(..)")
    }
}

impl Sealer for KeystreamSealer {
    fn seal(&self, value: u64) -> SealedValue {
        let mut nonce = [0u8; NONCE_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut nonce);

        let stream = self.keystream(&nonce);
        let masked: Vec<u8> = value
            .to_be_bytes()
            .iter()
            .zip(stream.iter())
            .map(|(v, k)| v ^ k)
            .collect();
        let tag = self.tag(&nonce, &masked);

        let mut out = Vec::with_capacity(SEALED_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&masked);
        out.extend_from_slice(tag.as_bytes());
        SealedValue::from_bytes(out)
    }

    fn open(&self, sealed: &SealedValue) -> Result<u64, SealError> {
        let bytes = sealed.as_bytes();
        if bytes.len() != SEALED_LEN {
            return Err(SealError::Malformed(format!(
                "expected {SEALED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (masked, tag) = rest.split_at(PLAINTEXT_WIDTH);

        let mut expected = [0u8; TAG_LEN];
        expected.copy_from_slice(tag);
        // blake3::Hash equality is constant-time.
        if self.tag(nonce, masked) != blake3::Hash::from(expected) {
            return Err(SealError::TagMismatch);
        }

        let stream = self.keystream(nonce);
        let mut plain = [0u8; PLAINTEXT_WIDTH];
        for (i, (m, k)) in masked.iter().zip(stream.iter()).enumerate() {
            plain[i] = m ^ k;
        }
        Ok(u64::from_be_bytes(plain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{CiphertextVerifier, PayloadVerifier};

    fn keyed(seed: u8) -> KeystreamSealer {
        KeystreamSealer::new([seed; 32])
    }

    #[test]
    fn keystream_values_open_with_the_same_key() {
        let sealer = keyed(1);
        let sealed = sealer.seal(125_000);
        assert_eq!(sealed.len(), KeystreamSealer::sealed_len());
        assert_eq!(sealer.open(&sealed).unwrap(), 125_000);
    }

    #[test]
    fn sealing_is_randomized() {
        let sealer = keyed(2);
        assert_ne!(sealer.seal(7), sealer.seal(7));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = keyed(3).seal(42);
        let err = keyed(4).open(&sealed).unwrap_err();
        assert_eq!(err, SealError::TagMismatch);
    }

    #[test]
    fn flipped_bit_fails_authentication() {
        let sealer = keyed(3);
        let mut bytes = sealer.seal(42).as_bytes().to_vec();
        bytes[NONCE_LEN] ^= 0x01;
        let err = sealer.open(&SealedValue::from_bytes(bytes)).unwrap_err();
        assert_eq!(err, SealError::TagMismatch);
    }

    #[test]
    fn truncated_value_is_malformed() {
        let sealer = keyed(3);
        let err = sealer
            .open(&SealedValue::from_bytes(vec![0u8; 10]))
            .unwrap_err();
        assert!(matches!(err, SealError::Malformed(_)));
    }

    #[test]
    fn generated_keys_reconstruct_the_sealer() {
        let (key, sealer) = KeystreamSealer::generate();
        let sealed = sealer.seal(9);
        assert_eq!(KeystreamSealer::new(key).open(&sealed).unwrap(), 9);
    }

    #[test]
    fn sealed_values_pass_ciphertext_verification() {
        let sealer = keyed(3);
        let verifier = CiphertextVerifier::new(1, 64);
        assert!(verifier.verify_amount(&sealer.seal(0)).is_ok());
    }

    #[test]
    fn plaintext_sealer_round_trips() {
        let sealed = PlaintextSealer.seal(365);
        assert_eq!(PlaintextSealer.open(&sealed).unwrap(), 365);
        assert!(PlaintextSealer
            .open(&SealedValue::from_bytes(vec![1]))
            .is_err());
    }

    #[test]
    fn debug_hides_keys() {
        let sealer = keyed(9);
        assert_eq!(format!("{sealer:?}"), "KeystreamSealer(..)");
    }
}
