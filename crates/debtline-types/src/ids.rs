use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The first id handed out by an empty ledger.
            pub const FIRST: Self = Self(1);

            /// Wrap a raw value. Zero is never allocated, so it is refused.
            pub fn new(raw: u64) -> Result<Self, TypeError> {
                if raw == 0 {
                    return Err(TypeError::InvalidId(format!(
                        "{} ids start at 1",
                        $prefix
                    )));
                }
                Ok(Self(raw))
            }

            pub const fn get(&self) -> u64 {
                self.0
            }

            /// The id allocated after this one.
            pub const fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            /// Parses `7` as well as the display form `debt#7`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .trim()
                    .strip_prefix(concat!($prefix, "#"))
                    .unwrap_or(s.trim());
                let raw = digits
                    .parse::<u64>()
                    .map_err(|e| TypeError::InvalidId(format!("{s}: {e}")))?;
                Self::new(raw)
            }
        }
    };
}

sequential_id!(
    /// Identifier of a debt record, allocated sequentially from 1.
    DebtId,
    "debt"
);

sequential_id!(
    /// Identifier of a restructuring proposal, allocated sequentially from 1.
    ProposalId,
    "proposal"
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(DebtId::new(0), Err(TypeError::InvalidId(_))));
        assert!(ProposalId::new(0).is_err());
    }

    #[test]
    fn display_and_parse() {
        let id = DebtId::new(42).unwrap();
        assert_eq!(id.to_string(), "debt#42");
        assert_eq!("debt#42".parse::<DebtId>().unwrap(), id);
        assert_eq!("42".parse::<DebtId>().unwrap(), id);
        assert_eq!(ProposalId::FIRST.to_string(), "proposal#1");
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        assert!("proposal#3".parse::<DebtId>().is_err());
        assert!("-1".parse::<ProposalId>().is_err());
    }

    #[test]
    fn next_is_successor() {
        assert_eq!(DebtId::FIRST.next().get(), 2);
    }

    proptest! {
        #[test]
        fn next_is_strictly_increasing(raw in 1u64..u64::MAX) {
            let id = ProposalId::new(raw).unwrap();
            prop_assert!(id.next() > id);
        }
    }
}
