//! Purchase records.
//!
//! One record per payment event. Only `completed` records grant
//! entitlement; `credits_remaining` is meaningful only for `pack_5`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Credits, PurchaseId, Result, UnlockError, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Credits granted by a completed `pack_5` purchase.
pub const PACK_5_CREDITS: u32 = 5;

/// Single-copy price in cents ($4).
pub const SINGLE_PRICE_CENTS: i64 = 400;

/// Five-copy pack price in cents ($15).
pub const PACK_5_PRICE_CENTS: i64 = 1500;

/// Unlimited access price in cents ($39).
pub const PACK_ALL_PRICE_CENTS: i64 = 3900;

/// What a purchase buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// One clean copy.
    Single,

    /// A pool of five clean copies, consumed one per generation.
    #[serde(rename = "pack_5")]
    Pack5,

    /// Unlimited clean copies; never metered.
    PackAll,
}

impl Tier {
    /// Get the tier name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Pack5 => "pack_5",
            Self::PackAll => "pack_all",
        }
    }

    /// Get the checkout price in cents.
    #[must_use]
    pub const fn price_cents(&self) -> i64 {
        match self {
            Self::Single => SINGLE_PRICE_CENTS,
            Self::Pack5 => PACK_5_PRICE_CENTS,
            Self::PackAll => PACK_ALL_PRICE_CENTS,
        }
    }

    /// Human-readable product name for checkout pages.
    #[must_use]
    pub const fn product_name(&self) -> &'static str {
        match self {
            Self::Single => "Clean copy",
            Self::Pack5 => "Clean copy 5-pack",
            Self::PackAll => "Unlimited clean copies",
        }
    }

    /// Whether generations under this tier spend credits.
    #[must_use]
    pub const fn is_metered(&self) -> bool {
        matches!(self, Self::Pack5)
    }
}

impl std::str::FromStr for Tier {
    type Err = UnlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Self::Single),
            "pack_5" => Ok(Self::Pack5),
            "pack_all" => Ok(Self::PackAll),
            other => Err(UnlockError::InvalidTier(other.to_string())),
        }
    }
}

/// Payment state of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Checkout started, payment not confirmed.
    Pending,

    /// Payment confirmed; counts toward entitlement.
    Completed,

    /// Payment failed or the checkout expired.
    Failed,

    /// Payment was refunded; no longer counts.
    Refunded,
}

impl PurchaseStatus {
    /// Get the status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed | Self::Failed) | (Self::Completed, Self::Refunded)
        )
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = UnlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(UnlockError::InvalidStatus(other.to_string())),
        }
    }
}

/// A purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Unique purchase ID (ULID for time-ordering).
    pub id: PurchaseId,

    /// The buyer.
    pub user_id: UserId,

    /// What was bought.
    pub tier: Tier,

    /// Payment state.
    pub status: PurchaseStatus,

    /// Remaining credits; `Some` only for completed `pack_5` records.
    pub credits_remaining: Option<Credits>,

    /// Whether a completed `pack_5` record starts with unlimited credits.
    #[serde(default)]
    pub unlimited: bool,

    /// Content item the purchase was started from, if any.
    ///
    /// Recorded for support; entitlement does not consult it.
    pub item_id: Option<String>,

    /// Payment gateway session that produced this record.
    pub checkout_session_id: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl PurchaseRecord {
    /// Create a pending record for a checkout that has not been paid yet.
    #[must_use]
    pub fn pending(user_id: UserId, tier: Tier, item_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PurchaseId::generate(),
            user_id,
            tier,
            status: PurchaseStatus::Pending,
            credits_remaining: None,
            unlimited: false,
            item_id,
            checkout_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an already-completed record (support grants, tests).
    #[must_use]
    pub fn completed(user_id: UserId, tier: Tier) -> Self {
        let mut record = Self::pending(user_id, tier, None);
        record.status = PurchaseStatus::Completed;
        record.credits_remaining = record.initial_credits();
        record
    }

    /// Create a completed `pack_5` record with an explicit balance.
    #[must_use]
    pub fn pack_5_with(user_id: UserId, credits: Credits) -> Self {
        let mut record = Self::completed(user_id, Tier::Pack5);
        record.unlimited = credits.is_unlimited();
        record.credits_remaining = Some(credits);
        record
    }

    /// Mark this record as granting unlimited credits once completed.
    #[must_use]
    pub fn with_unlimited(mut self) -> Self {
        self.unlimited = true;
        if self.status == PurchaseStatus::Completed && self.tier == Tier::Pack5 {
            self.credits_remaining = Some(Credits::Unlimited);
        }
        self
    }

    /// Balance a freshly completed record starts with.
    #[must_use]
    pub fn initial_credits(&self) -> Option<Credits> {
        match self.tier {
            Tier::Pack5 if self.unlimited => Some(Credits::Unlimited),
            Tier::Pack5 => Some(Credits::Finite(PACK_5_CREDITS)),
            Tier::Single | Tier::PackAll => None,
        }
    }

    /// Whether this record counts toward entitlement.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }

    /// Move the record to a new status.
    ///
    /// Completing a `pack_5` record seeds its credit pool. Tier and owner
    /// are never touched.
    ///
    /// # Errors
    ///
    /// Returns `UnlockError::InvalidStatusTransition` if the lifecycle
    /// forbids the move.
    pub fn transition(&mut self, next: PurchaseStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(UnlockError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }

        if next == PurchaseStatus::Completed {
            self.credits_remaining = self.initial_credits();
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
