//! Entitlement endpoint tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use z_unlock_core::{Credits, PurchaseRecord, PurchaseStatus, Tier, UserId};

#[tokio::test]
async fn test_entitlement_requires_auth() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/entitlements/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_purchases_means_watermark() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["has_access"], false);
    assert_eq!(body["source"], "none");
    assert_eq!(body["watermark"], true);
    assert!(body.get("remaining_credits").is_none());
}

#[tokio::test]
async fn test_pack_all_beats_everything() {
    let harness = TestHarness::new();
    harness.seed_pack_5(3);
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::Single));
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::PackAll));

    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["has_access"], true);
    assert_eq!(body["source"], "pack_all");
    assert_eq!(body["watermark"], false);
}

#[tokio::test]
async fn test_pack_5_reports_largest_balance() {
    let harness = TestHarness::new();
    harness.seed_pack_5(1);
    let bigger = harness.seed_pack_5(4);

    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["source"], "pack_5_credit");
    assert_eq!(body["remaining_credits"], 4);
    assert_eq!(body["source_record_id"], bigger.id.to_string());
    assert_eq!(body["watermark"], false);
}

#[tokio::test]
async fn test_exhausted_and_pending_grant_nothing() {
    let harness = TestHarness::new();
    harness.seed_pack_5(0);
    harness.seed(PurchaseRecord::pending(
        harness.test_user_id,
        Tier::PackAll,
        None,
    ));

    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["has_access"], false);
    assert_eq!(body["watermark"], true);
}

#[tokio::test]
async fn test_unlimited_pack_5() {
    let harness = TestHarness::new();
    harness.seed(PurchaseRecord::pack_5_with(
        harness.test_user_id,
        Credits::Unlimited,
    ));

    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["source"], "pack_5_credit");
    assert_eq!(body["remaining_credits"], "unlimited");
}

#[tokio::test]
async fn test_refunded_purchase_revokes_access() {
    let harness = TestHarness::new();
    let mut record = PurchaseRecord::completed(harness.test_user_id, Tier::PackAll);
    record.transition(PurchaseStatus::Refunded).unwrap();
    harness.seed(record);

    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();

    assert_eq!(body["has_access"], false);
}

#[tokio::test]
async fn test_entitlements_are_per_user() {
    let harness = TestHarness::new();
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::PackAll));

    let other = UserId::generate();
    let body: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", TestHarness::auth_header_for(&other))
        .await
        .json();

    assert_eq!(body["has_access"], false);
}
