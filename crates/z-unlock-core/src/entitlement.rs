//! Entitlement resolution and the watermark gate.
//!
//! [`resolve`] folds a user's purchase records into one [`AccessDecision`]
//! using a fixed precedence:
//!
//! 1. any completed `pack_all` record
//! 2. any completed `single` record
//! 3. the completed `pack_5` record with the largest balance, if that
//!    balance is positive or unlimited
//! 4. no access
//!
//! Decisions are computed per request and never cached: purchases can
//! complete and credits can be spent from other sessions at any time.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Credits, PurchaseId, PurchaseRecord, Tier};

/// Which kind of record granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// No record grants access.
    None,

    /// An unlimited-access purchase.
    PackAll,

    /// A single-copy purchase.
    Single,

    /// A credit from a five-copy pack; generation must spend it.
    #[serde(rename = "pack_5_credit")]
    Pack5Credit,
}

impl AccessSource {
    /// Get the source name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PackAll => "pack_all",
            Self::Single => "single",
            Self::Pack5Credit => "pack_5_credit",
        }
    }

    /// Whether generating under this source must consume a credit.
    #[must_use]
    pub const fn is_metered(&self) -> bool {
        matches!(self, Self::Pack5Credit)
    }
}

/// Outcome of one entitlement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether the user may receive a clean copy.
    pub has_access: bool,

    /// Which kind of record granted access.
    pub source: AccessSource,

    /// Balance of the granting pack; set only for `pack_5_credit`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remaining_credits: Option<Credits>,

    /// Record to decrement; set only for `pack_5_credit`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_record_id: Option<PurchaseId>,
}

impl AccessDecision {
    /// A decision granting nothing.
    #[must_use]
    pub const fn no_access() -> Self {
        Self {
            has_access: false,
            source: AccessSource::None,
            remaining_credits: None,
            source_record_id: None,
        }
    }

    const fn unmetered(source: AccessSource) -> Self {
        Self {
            has_access: true,
            source,
            remaining_credits: None,
            source_record_id: None,
        }
    }

    /// A decision backed by a credit pool.
    #[must_use]
    pub const fn pack_5_credit(record_id: PurchaseId, remaining: Credits) -> Self {
        Self {
            has_access: true,
            source: AccessSource::Pack5Credit,
            remaining_credits: Some(remaining),
            source_record_id: Some(record_id),
        }
    }
}

/// Resolve a user's purchase records into an access decision.
///
/// Records that are not `completed` are ignored. Never fails; an empty or
/// all-failed list simply yields no access.
#[must_use]
pub fn resolve(records: &[PurchaseRecord]) -> AccessDecision {
    let completed = || records.iter().filter(|r| r.is_completed());

    if completed().any(|r| r.tier == Tier::PackAll) {
        return AccessDecision::unmetered(AccessSource::PackAll);
    }

    // A single purchase unlocks every item, not just the one it was bought from.
    if completed().any(|r| r.tier == Tier::Single) {
        return AccessDecision::unmetered(AccessSource::Single);
    }

    completed()
        .filter(|r| r.tier == Tier::Pack5)
        .max_by(|a, b| compare_packs(a, b))
        .and_then(|best| {
            let balance = pack_balance(best);
            balance
                .is_available()
                .then(|| AccessDecision::pack_5_credit(best.id, balance))
        })
        .unwrap_or_else(AccessDecision::no_access)
}

/// Whether a generated copy must carry a watermark.
#[must_use]
pub const fn should_watermark(decision: &AccessDecision) -> bool {
    !decision.has_access
}

fn pack_balance(record: &PurchaseRecord) -> Credits {
    record.credits_remaining.unwrap_or(Credits::ZERO)
}

/// Larger balance wins; on a tie the older record wins, then the smaller id.
fn compare_packs(a: &PurchaseRecord, b: &PurchaseRecord) -> Ordering {
    pack_balance(a)
        .cmp(&pack_balance(b))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PurchaseStatus, UserId};
    use chrono::Duration;

    fn pack(user_id: UserId, credits: Credits) -> PurchaseRecord {
        PurchaseRecord::pack_5_with(user_id, credits)
    }

    #[test]
    fn empty_records_deny_access() {
        let decision = resolve(&[]);
        assert_eq!(decision, AccessDecision::no_access());
        assert!(should_watermark(&decision));
    }

    #[test]
    fn pack_all_takes_precedence_over_everything() {
        let user_id = UserId::generate();
        let records = vec![
            pack(user_id, Credits::Unlimited),
            PurchaseRecord::completed(user_id, Tier::Single),
            PurchaseRecord::completed(user_id, Tier::PackAll),
        ];

        let decision = resolve(&records);
        assert!(decision.has_access);
        assert_eq!(decision.source, AccessSource::PackAll);
        assert_eq!(decision.remaining_credits, None);
        assert_eq!(decision.source_record_id, None);
        assert!(!should_watermark(&decision));
    }

    #[test]
    fn single_beats_credit_packs() {
        let user_id = UserId::generate();
        let records = vec![
            pack(user_id, Credits::Finite(4)),
            PurchaseRecord::completed(user_id, Tier::Single),
        ];

        assert_eq!(resolve(&records).source, AccessSource::Single);
    }

    #[test]
    fn single_beats_exhausted_pack() {
        let user_id = UserId::generate();
        let records = vec![
            PurchaseRecord::completed(user_id, Tier::Single),
            pack(user_id, Credits::ZERO),
        ];

        let decision = resolve(&records);
        assert!(decision.has_access);
        assert_eq!(decision.source, AccessSource::Single);
    }

    #[test]
    fn pack_with_three_credits() {
        let user_id = UserId::generate();
        let record = pack(user_id, Credits::Finite(3));
        let id = record.id;

        assert_eq!(
            resolve(&[record]),
            AccessDecision {
                has_access: true,
                source: AccessSource::Pack5Credit,
                remaining_credits: Some(Credits::Finite(3)),
                source_record_id: Some(id),
            }
        );
    }

    #[test]
    fn largest_pack_balance_is_selected() {
        let user_id = UserId::generate();
        let small = pack(user_id, Credits::Finite(1));
        let large = pack(user_id, Credits::Finite(4));
        let empty = pack(user_id, Credits::ZERO);
        let large_id = large.id;

        let decision = resolve(&[small, large, empty]);
        assert_eq!(decision.source_record_id, Some(large_id));
        assert_eq!(decision.remaining_credits, Some(Credits::Finite(4)));
    }

    #[test]
    fn unlimited_pack_outranks_finite_packs() {
        let user_id = UserId::generate();
        let finite = pack(user_id, Credits::Finite(u32::MAX));
        let unlimited = pack(user_id, Credits::Unlimited);
        let unlimited_id = unlimited.id;

        let decision = resolve(&[finite, unlimited]);
        assert_eq!(decision.source_record_id, Some(unlimited_id));
        assert_eq!(decision.remaining_credits, Some(Credits::Unlimited));
    }

    #[test]
    fn equal_balances_prefer_oldest_pack() {
        let user_id = UserId::generate();
        let mut newer = pack(user_id, Credits::Finite(2));
        let mut older = pack(user_id, Credits::Finite(2));
        older.created_at = newer.created_at - Duration::hours(1);
        newer.created_at += Duration::seconds(1);
        let older_id = older.id;

        assert_eq!(resolve(&[newer.clone(), older.clone()]).source_record_id, Some(older_id));
        assert_eq!(resolve(&[older, newer]).source_record_id, Some(older_id));
    }

    #[test]
    fn exhausted_packs_deny_access() {
        let user_id = UserId::generate();
        let records = vec![pack(user_id, Credits::ZERO), pack(user_id, Credits::ZERO)];

        let decision = resolve(&records);
        assert!(!decision.has_access);
        assert_eq!(decision.source, AccessSource::None);
    }

    #[test]
    fn pack_without_balance_counts_as_empty() {
        let mut record = pack(UserId::generate(), Credits::Finite(2));
        record.credits_remaining = None;

        assert!(!resolve(&[record]).has_access);
    }

    #[test]
    fn non_completed_records_are_ignored() {
        let user_id = UserId::generate();
        let mut refunded = PurchaseRecord::completed(user_id, Tier::PackAll);
        refunded.status = PurchaseStatus::Refunded;
        let pending = PurchaseRecord::pending(user_id, Tier::Single, None);
        let mut failed = pack(user_id, Credits::Finite(5));
        failed.status = PurchaseStatus::Failed;

        assert_eq!(resolve(&[refunded, pending, failed]), AccessDecision::no_access());
    }

    #[test]
    fn resolution_is_deterministic() {
        let user_id = UserId::generate();
        let records = vec![
            pack(user_id, Credits::Finite(2)),
            pack(user_id, Credits::Finite(2)),
            pack(user_id, Credits::Finite(1)),
        ];

        let first = resolve(&records);
        let mut reversed = records.clone();
        reversed.reverse();

        assert_eq!(resolve(&records), first);
        assert_eq!(resolve(&reversed), first);
    }

    #[test]
    fn decision_json_omits_unset_fields() {
        let json = serde_json::to_value(AccessDecision::no_access()).unwrap();
        assert_eq!(json, serde_json::json!({"has_access": false, "source": "none"}));
    }
}
