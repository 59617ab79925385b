//! Generation gate and credit consumption tests.

mod common;

use std::future::IntoFuture;

use axum::http::StatusCode;
use axum_test::TestRequest;
use common::TestHarness;
use serde_json::json;
use z_unlock_core::{Credits, PurchaseRecord, Tier, UserId};

fn generate(harness: &TestHarness, generation_id: &str) -> TestRequest {
    harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "generation_id": generation_id }))
}

#[tokio::test]
async fn test_generation_requires_auth() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/generations")
        .json(&json!({ "generation_id": "gen-1" }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_generation_id_rejected() {
    let harness = TestHarness::new();

    let response = generate(&harness, "   ").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_access_is_watermarked() {
    let harness = TestHarness::new();

    let response = generate(&harness, "gen-1").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["watermark"], true);
    assert_eq!(body["decision"]["source"], "none");
    assert!(body.get("consumption").is_none());
}

#[tokio::test]
async fn test_single_tier_is_not_metered() {
    let harness = TestHarness::new();
    harness.seed(PurchaseRecord::completed(harness.test_user_id, Tier::Single));

    for id in ["gen-1", "gen-2"] {
        let body: serde_json::Value = generate(&harness, id).await.json();
        assert_eq!(body["watermark"], false);
        assert_eq!(body["decision"]["source"], "single");
        assert_eq!(body["consumption"]["status"], "settled");
        assert_eq!(body["consumption"]["consumed"], false);
    }
}

#[tokio::test]
async fn test_pack_5_spends_one_credit() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(3);

    let response = generate(&harness, "gen-1").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["generation_id"], "gen-1");
    assert_eq!(body["watermark"], false);
    assert_eq!(body["decision"]["source"], "pack_5_credit");
    assert_eq!(body["consumption"]["consumed"], true);
    assert_eq!(body["consumption"]["remaining_credits"], 2);
    assert_eq!(body["consumption"]["replayed"], false);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(2)));
}

#[tokio::test]
async fn test_retry_is_replayed_without_second_spend() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(3);

    generate(&harness, "gen-1").await.assert_status_ok();
    let retry: serde_json::Value = generate(&harness, "gen-1").await.json();

    assert_eq!(retry["watermark"], false);
    assert_eq!(retry["consumption"]["consumed"], true);
    assert_eq!(retry["consumption"]["replayed"], true);
    assert_eq!(retry["consumption"]["remaining_credits"], 2);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(2)));
}

#[tokio::test]
async fn test_retry_after_last_credit_still_clean() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(1);

    let first: serde_json::Value = generate(&harness, "last").await.json();
    assert_eq!(first["consumption"]["remaining_credits"], 0);

    let retry: serde_json::Value = generate(&harness, "last").await.json();
    assert_eq!(retry["watermark"], false);
    assert_eq!(retry["consumption"]["replayed"], true);

    let fresh: serde_json::Value = generate(&harness, "next").await.json();
    assert_eq!(fresh["watermark"], true);
    assert_eq!(fresh["decision"]["has_access"], false);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(0)));
}

#[tokio::test]
async fn test_five_generations_drain_pack() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(5);

    for i in 0..5 {
        let body: serde_json::Value = generate(&harness, &format!("gen-{i}")).await.json();
        assert_eq!(body["watermark"], false);
        assert_eq!(body["consumption"]["remaining_credits"], 4 - i);
    }

    let sixth: serde_json::Value = generate(&harness, "gen-5").await.json();
    assert_eq!(sixth["watermark"], true);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(0)));
}

#[tokio::test]
async fn test_racing_sessions_spend_last_credit_once() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(1);

    let requests = (0..8).map(|i| generate(&harness, &format!("race-{i}")).into_future());
    let responses = futures::future::join_all(requests).await;

    let mut clean = 0;
    for response in responses {
        let status = response.status_code();
        let body: serde_json::Value = response.json();
        if status == StatusCode::OK && body["watermark"] == false {
            assert_eq!(body["consumption"]["consumed"], true);
            clean += 1;
        } else if status == StatusCode::CONFLICT {
            assert_eq!(body["error"]["code"], "credit_exhausted");
        } else {
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["watermark"], true);
        }
    }

    assert_eq!(clean, 1);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(0)));
}

#[tokio::test]
async fn test_larger_pack_is_spent_first() {
    let harness = TestHarness::new();
    let small = harness.seed_pack_5(1);
    let large = harness.seed_pack_5(3);

    let body: serde_json::Value = generate(&harness, "gen-1").await.json();

    assert_eq!(body["decision"]["source_record_id"], large.id.to_string());
    assert_eq!(harness.balance(&large.id), Some(Credits::Finite(2)));
    assert_eq!(harness.balance(&small.id), Some(Credits::Finite(1)));
}

#[tokio::test]
async fn test_unlimited_pack_never_drains() {
    let harness = TestHarness::new();
    let pack = harness.seed(PurchaseRecord::pack_5_with(
        harness.test_user_id,
        Credits::Unlimited,
    ));

    for i in 0..10 {
        let body: serde_json::Value = generate(&harness, &format!("gen-{i}")).await.json();
        assert_eq!(body["watermark"], false);
        assert_eq!(body["consumption"]["remaining_credits"], "unlimited");
    }

    assert_eq!(harness.balance(&pack.id), Some(Credits::Unlimited));
}

#[tokio::test]
async fn test_delivered_generation_settles() {
    let harness = TestHarness::new();
    let pack = harness.seed_pack_5(2);

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "generation_id": "shipped", "delivered": true }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["consumption"]["status"], "settled");
    assert_eq!(body["consumption"]["remaining_credits"], 1);
    assert_eq!(harness.balance(&pack.id), Some(Credits::Finite(1)));
}

#[tokio::test]
async fn test_generation_id_owned_by_another_user() {
    let harness = TestHarness::new();
    harness.seed_pack_5(2);
    generate(&harness, "shared").await.assert_status_ok();

    let other = UserId::generate();
    harness.seed(PurchaseRecord::pack_5_with(other, Credits::Finite(2)));

    let response = harness
        .server
        .post("/v1/generations")
        .add_header("authorization", TestHarness::auth_header_for(&other))
        .json(&json!({ "generation_id": "shared" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "generation_conflict");
}
