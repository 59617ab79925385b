//! Credit balances for metered purchases.
//!
//! A balance is either a finite count or the `Unlimited` sentinel. The
//! sentinel is a distinct value, not a large number: it orders above every
//! finite balance and is never decremented.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire spelling of the unlimited sentinel.
const UNLIMITED: &str = "unlimited";

/// A credit balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CreditsRepr", into = "CreditsRepr")]
pub enum Credits {
    /// A finite number of remaining uses.
    Finite(u32),
    /// Never exhausted.
    Unlimited,
}

impl Credits {
    /// An empty balance.
    pub const ZERO: Self = Self::Finite(0);

    /// Whether at least one more use is available.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::Finite(n) => n > 0,
            Self::Unlimited => true,
        }
    }

    /// Whether this is the unlimited sentinel.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// Spend one unit.
    ///
    /// Returns the new balance, or `None` if the balance is already zero.
    /// The unlimited sentinel comes back unchanged.
    #[must_use]
    pub const fn spend_one(self) -> Option<Self> {
        match self {
            Self::Unlimited => Some(Self::Unlimited),
            Self::Finite(0) => None,
            Self::Finite(n) => Some(Self::Finite(n - 1)),
        }
    }
}

impl Ord for Credits {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Unlimited, Self::Unlimited) => Ordering::Equal,
            (Self::Unlimited, Self::Finite(_)) => Ordering::Greater,
            (Self::Finite(_), Self::Unlimited) => Ordering::Less,
            (Self::Finite(a), Self::Finite(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Credits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str(UNLIMITED),
        }
    }
}

/// Serialized form: a number, or the string `"unlimited"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CreditsRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<CreditsRepr> for Credits {
    type Error = String;

    fn try_from(repr: CreditsRepr) -> Result<Self, Self::Error> {
        match repr {
            CreditsRepr::Count(n) => Ok(Self::Finite(n)),
            CreditsRepr::Word(word) if word == UNLIMITED => Ok(Self::Unlimited),
            CreditsRepr::Word(word) => Err(format!("invalid credit balance: {word}")),
        }
    }
}

impl From<Credits> for CreditsRepr {
    fn from(credits: Credits) -> Self {
        match credits {
            Credits::Finite(n) => Self::Count(n),
            Credits::Unlimited => Self::Word(UNLIMITED.to_string()),
        }
    }
}
