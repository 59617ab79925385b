//! Consumption outcomes and the generation journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Credits, GenerationId, PurchaseId, UserId};

/// What a consumption request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionOutcome {
    /// Whether a credit was spent for this generation (now or earlier).
    pub consumed: bool,

    /// Balance after consumption, for metered sources.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remaining_credits: Option<Credits>,

    /// Served from the journal of an earlier identical request.
    #[serde(default)]
    pub replayed: bool,
}

impl ConsumptionOutcome {
    /// Outcome for sources that are not metered.
    #[must_use]
    pub const fn not_metered() -> Self {
        Self {
            consumed: false,
            remaining_credits: None,
            replayed: false,
        }
    }

    /// Outcome of a credit spent by this request.
    #[must_use]
    pub const fn spent(remaining: Credits) -> Self {
        Self {
            consumed: true,
            remaining_credits: Some(remaining),
            replayed: false,
        }
    }
}

/// Journal entry keyed by generation id.
///
/// Written in the same atomic store step as the decrement it records, so
/// an entry exists exactly when the credit was spent and a retry can be
/// answered without spending again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// The generation this entry covers.
    pub generation_id: GenerationId,

    /// Who generated.
    pub user_id: UserId,

    /// Which pack was charged.
    pub purchase_id: PurchaseId,

    /// Balance after the decrement.
    pub remaining_credits: Credits,

    /// When the credit was spent.
    pub consumed_at: DateTime<Utc>,
}

impl ConsumptionRecord {
    /// Record a spent credit and the balance it left.
    #[must_use]
    pub fn spent(
        generation_id: GenerationId,
        user_id: UserId,
        purchase_id: PurchaseId,
        remaining: Credits,
    ) -> Self {
        Self {
            generation_id,
            user_id,
            purchase_id,
            remaining_credits: remaining,
            consumed_at: Utc::now(),
        }
    }

    /// The outcome to hand back when this generation is retried.
    #[must_use]
    pub const fn replay(&self) -> ConsumptionOutcome {
        ConsumptionOutcome {
            consumed: true,
            remaining_credits: Some(self.remaining_credits),
            replayed: true,
        }
    }
}
