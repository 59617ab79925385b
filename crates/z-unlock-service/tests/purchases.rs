//! Purchase listing, checkout and admin grant tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{TestHarness, ADMIN_API_KEY};
use serde_json::json;
use z_unlock_core::{Credits, PurchaseRecord, PurchaseStatus, Tier, UserId};

#[tokio::test]
async fn test_list_purchases_empty() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/purchases")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["purchases"], json!([]));
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn test_list_purchases_filters_and_pages() {
    let harness = TestHarness::new();
    harness.seed_pack_5(5);
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::Single));
    harness.seed(PurchaseRecord::pending(
        harness.test_user_id,
        Tier::PackAll,
        Some("song-42".into()),
    ));
    harness.seed(PurchaseRecord::completed(UserId::generate(), Tier::PackAll));

    let all: serde_json::Value = harness
        .server
        .get("/v1/purchases")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(all["purchases"].as_array().unwrap().len(), 3);

    let completed: serde_json::Value = harness
        .server
        .get("/v1/purchases?status=completed")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(completed["purchases"].as_array().unwrap().len(), 2);

    let packs: serde_json::Value = harness
        .server
        .get("/v1/purchases?tier=pack_5")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    let packs = packs["purchases"].as_array().unwrap();
    assert_eq!(packs.len(), 1);
    assert_eq!(packs[0]["credits_remaining"], 5);
    assert_eq!(packs[0]["price_cents"], Tier::Pack5.price_cents());

    let page: serde_json::Value = harness
        .server
        .get("/v1/purchases?limit=2")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(page["purchases"].as_array().unwrap().len(), 2);
    assert_eq!(page["has_more"], true);

    let rest: serde_json::Value = harness
        .server
        .get("/v1/purchases?limit=2&offset=2")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(rest["purchases"].as_array().unwrap().len(), 1);
    assert_eq!(rest["has_more"], false);
}

#[tokio::test]
async fn test_list_purchases_rejects_unknown_status() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/purchases?status=paid")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_creates_pending_purchase() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "pack_5", "item_id": "song-7" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["session_id"], "cs_test_0");
    assert_eq!(body["checkout_url"], "https://checkout.test/cs_test_0");

    let purchase_id = body["purchase_id"].as_str().unwrap().parse().unwrap();
    let record = harness.purchase(&purchase_id);
    assert_eq!(record.status, PurchaseStatus::Pending);
    assert_eq!(record.tier, Tier::Pack5);
    assert_eq!(record.item_id.as_deref(), Some("song-7"));
    assert_eq!(record.checkout_session_id.as_deref(), Some("cs_test_0"));

    let requests = harness.checkout.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].purchase_id, purchase_id);
    assert_eq!(requests[0].user_id, harness.test_user_id);
    assert!(requests[0].success_url.contains("{CHECKOUT_SESSION_ID}"));
}

#[tokio::test]
async fn test_checkout_keeps_completion_from_early_webhook() {
    let harness = TestHarness::new();
    harness.checkout.pay_before_return(Arc::clone(&harness.store));

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "pack_5" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let purchase_id = body["purchase_id"].as_str().unwrap().parse().unwrap();

    let record = harness.purchase(&purchase_id);
    assert_eq!(record.status, PurchaseStatus::Completed);
    assert_eq!(record.credits_remaining, Some(Credits::Finite(5)));
    assert_eq!(record.checkout_session_id.as_deref(), Some("cs_test_0"));
    assert_eq!(
        harness
            .store
            .find_purchase_by_session("cs_test_0")
            .unwrap()
            .unwrap()
            .id,
        purchase_id
    );
}

#[tokio::test]
async fn test_checkout_refused_when_already_entitled() {
    let harness = TestHarness::new();
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::Single));

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "pack_all" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert!(harness.checkout.requests().is_empty());
}

#[tokio::test]
async fn test_checkout_allowed_after_pack_exhausted() {
    let harness = TestHarness::new();
    harness.seed_pack_5(0);

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "pack_5" }))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_checkout_failure_marks_purchase_failed() {
    let harness = TestHarness::new();
    harness.checkout.fail_next();

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "single" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);

    let failed = harness
        .store
        .list_purchases_by_user(&harness.test_user_id, Default::default(), 10, 0)
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, PurchaseStatus::Failed);
}

#[tokio::test]
async fn test_checkout_without_provider() {
    let harness = TestHarness::without_checkout();

    let response = harness
        .server
        .post("/v1/purchases/checkout")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "tier": "single" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_admin_grant_requires_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/purchases/grant")
        .add_header("x-admin-key", "wrong")
        .json(&json!({ "user_id": harness.test_user_id.to_string(), "tier": "pack_all" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_grant_gives_access() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/purchases/grant")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "tier": "pack_5",
            "credits": 2,
            "reason": "support ticket"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["credits_remaining"], 2);

    let entitlement: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(entitlement["source"], "pack_5_credit");
    assert_eq!(entitlement["remaining_credits"], 2);
}

#[tokio::test]
async fn test_admin_grant_unlimited() {
    let harness = TestHarness::new();

    let body: serde_json::Value = harness
        .server
        .post("/v1/purchases/grant")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "tier": "pack_5",
            "unlimited": true
        }))
        .await
        .json();

    let id = body["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(harness.balance(&id), Some(Credits::Unlimited));
}

#[tokio::test]
async fn test_admin_grant_rejects_credits_on_other_tiers() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/purchases/grant")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "tier": "single",
            "credits": 3
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
