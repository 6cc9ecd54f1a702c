use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Transaction time, in whole seconds since the UNIX epoch.
///
/// The ledger never reads the wall clock itself: the submitting layer
/// stamps every call, which keeps ledger behavior deterministic under
/// replay and in tests.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    /// The zero timestamp (UNIX epoch).
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}s)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        // After 2020-01-01.
        assert!(Timestamp::now().as_secs() > 1_577_836_800);
    }

    #[test]
    fn ordering_follows_seconds() {
        assert!(Timestamp::from_secs(10) < Timestamp::from_secs(11));
        assert!(Timestamp::zero() < Timestamp::from_secs(1));
    }

    #[test]
    fn serializes_as_plain_number() {
        let ts = Timestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000");
    }
}
