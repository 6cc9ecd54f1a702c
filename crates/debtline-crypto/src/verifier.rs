use debtline_types::SealedValue;

/// Width of a plaintext-encoded number: a big-endian `u64`.
pub const PLAINTEXT_WIDTH: usize = 8;

/// Capability the ledger uses to check sealed amounts and rates.
///
/// The ledger never decodes a [`SealedValue`]. Whatever can be said about
/// the number inside one is said here, by an implementation that knows
/// how the value was sealed.
pub trait PayloadVerifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Check a principal amount.
    fn verify_amount(&self, value: &SealedValue) -> Result<(), PayloadError>;

    /// Check an interest rate, in basis points.
    fn verify_rate(&self, value: &SealedValue) -> Result<(), PayloadError>;
}

/// Why a sealed payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,

    #[error("malformed payload: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },

    #[error("value {value} outside allowed range {min}..={max}")]
    OutOfRange { value: u64, min: u64, max: u64 },

    #[error("payload length {len} outside allowed range {min}..={max}")]
    BadLength { len: usize, min: usize, max: usize },
}

/// Verifier for the simplified deployment where amounts and rates travel
/// as plaintext big-endian `u64`s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextVerifier {
    pub max_amount: u64,
    pub max_rate_bps: u64,
}

impl PlaintextVerifier {
    pub fn new(max_amount: u64, max_rate_bps: u64) -> Self {
        Self {
            max_amount,
            max_rate_bps,
        }
    }

    /// Encode a number the way this verifier expects to read it.
    pub fn encode(value: u64) -> SealedValue {
        SealedValue::from_bytes(value.to_be_bytes().to_vec())
    }

    /// Decode a plaintext payload.
    pub fn decode(value: &SealedValue) -> Result<u64, PayloadError> {
        if value.is_empty() {
            return Err(PayloadError::Empty);
        }
        let bytes: [u8; PLAINTEXT_WIDTH] =
            value
                .as_bytes()
                .try_into()
                .map_err(|_| PayloadError::Malformed {
                    expected: PLAINTEXT_WIDTH,
                    actual: value.len(),
                })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn check_range(value: u64, min: u64, max: u64) -> Result<(), PayloadError> {
        if value < min || value > max {
            return Err(PayloadError::OutOfRange { value, min, max });
        }
        Ok(())
    }
}

impl PayloadVerifier for PlaintextVerifier {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn verify_amount(&self, value: &SealedValue) -> Result<(), PayloadError> {
        Self::check_range(Self::decode(value)?, 1, self.max_amount)
    }

    fn verify_rate(&self, value: &SealedValue) -> Result<(), PayloadError> {
        Self::check_range(Self::decode(value)?, 0, self.max_rate_bps)
    }
}

/// Verifier for genuinely encrypted payloads.
///
/// Ciphertext cannot be range-checked without the key, so only the blob's
/// length is bounded. Semantic checks belong to the encryption service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CiphertextVerifier {
    pub min_len: usize,
    pub max_len: usize,
}

impl CiphertextVerifier {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    fn check_len(&self, value: &SealedValue) -> Result<(), PayloadError> {
        if value.is_empty() {
            return Err(PayloadError::Empty);
        }
        if value.len() < self.min_len || value.len() > self.max_len {
            return Err(PayloadError::BadLength {
                len: value.len(),
                min: self.min_len,
                max: self.max_len,
            });
        }
        Ok(())
    }
}

impl PayloadVerifier for CiphertextVerifier {
    fn name(&self) -> &str {
        "ciphertext"
    }

    fn verify_amount(&self, value: &SealedValue) -> Result<(), PayloadError> {
        self.check_len(value)
    }

    fn verify_rate(&self, value: &SealedValue) -> Result<(), PayloadError> {
        self.check_len(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plaintext() -> PlaintextVerifier {
        PlaintextVerifier::new(1_000_000, 10_000)
    }

    #[test]
    fn zero_amount_is_refused() {
        let err = plaintext()
            .verify_amount(&PlaintextVerifier::encode(0))
            .unwrap_err();
        assert_eq!(
            err,
            PayloadError::OutOfRange {
                value: 0,
                min: 1,
                max: 1_000_000
            }
        );
    }

    #[test]
    fn amount_above_platform_max_is_refused() {
        let v = plaintext();
        assert!(v.verify_amount(&PlaintextVerifier::encode(1_000_000)).is_ok());
        assert!(v.verify_amount(&PlaintextVerifier::encode(1_000_001)).is_err());
    }

    #[test]
    fn zero_rate_is_allowed() {
        assert!(plaintext().verify_rate(&PlaintextVerifier::encode(0)).is_ok());
        assert!(plaintext()
            .verify_rate(&PlaintextVerifier::encode(10_001))
            .is_err());
    }

    #[test]
    fn wrong_width_is_malformed() {
        let err = plaintext()
            .verify_amount(&SealedValue::from_bytes(vec![1, 2, 3]))
            .unwrap_err();
        assert_eq!(
            err,
            PayloadError::Malformed {
                expected: 8,
                actual: 3
            }
        );
        assert_eq!(
            plaintext().verify_rate(&SealedValue::default()),
            Err(PayloadError::Empty)
        );
    }

    #[test]
    fn ciphertext_only_checks_length() {
        let v = CiphertextVerifier::new(4, 16);
        assert!(v.verify_amount(&SealedValue::from_bytes(vec![0xff; 4])).is_ok());
        assert!(v.verify_rate(&SealedValue::from_bytes(vec![0x00; 16])).is_ok());
        assert_eq!(
            v.verify_amount(&SealedValue::from_bytes(vec![1; 17])),
            Err(PayloadError::BadLength {
                len: 17,
                min: 4,
                max: 16
            })
        );
        assert_eq!(
            v.verify_amount(&SealedValue::default()),
            Err(PayloadError::Empty)
        );
    }

    #[test]
    fn verifiers_are_object_safe() {
        let verifiers: Vec<Box<dyn PayloadVerifier>> = vec![
            Box::new(plaintext()),
            Box::new(CiphertextVerifier::new(1, 64)),
        ];
        let names: Vec<&str> = verifiers.iter().map(|v| v.name()).collect();
        assert_eq!(names, ["plaintext", "ciphertext"]);
    }

    proptest! {
        #[test]
        fn plaintext_decode_inverts_encode(value in any::<u64>()) {
            prop_assert_eq!(PlaintextVerifier::decode(&PlaintextVerifier::encode(value)).unwrap(), value);
        }
    }
}
