//! Request and response types for the z-unlock client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use z_unlock_core::{AccessDecision, AccessSource, Credits, PurchaseStatus, Tier};

/// Current entitlement of the authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementResponse {
    /// The access decision.
    #[serde(flatten)]
    pub decision: AccessDecision,
    /// Whether a generation right now would be watermarked.
    pub watermark: bool,
}

/// Generation request body.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Idempotency key for this artifact.
    pub generation_id: String,
    /// The clean copy was already delivered.
    pub delivered: bool,
}

/// Whether the credit side of a generation is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionStatus {
    /// Consumption succeeded or was not needed.
    Settled,
    /// Consumption failed after delivery.
    Unsettled,
}

/// Why an after-delivery consumption failed.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionFailure {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Consumption result of a generation.
#[derive(Debug, Clone, Deserialize)]
pub struct Consumption {
    /// Settled or not.
    pub status: ConsumptionStatus,
    /// Whether a credit was spent for this generation.
    #[serde(default)]
    pub consumed: bool,
    /// Balance after consumption, for credit packs.
    #[serde(default)]
    pub remaining_credits: Option<Credits>,
    /// Served from an earlier identical request.
    #[serde(default)]
    pub replayed: bool,
    /// Failure details when unsettled.
    #[serde(default)]
    pub error: Option<ConsumptionFailure>,
}

/// Result of gating one generation.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    /// Echo of the request key.
    pub generation_id: String,
    /// Whether the artifact must carry a watermark.
    pub watermark: bool,
    /// Decision the gate used.
    pub decision: AccessDecision,
    /// Absent when there was no access.
    #[serde(default)]
    pub consumption: Option<Consumption>,
}

/// Checkout request body.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    /// Tier to buy.
    pub tier: Tier,
    /// Item the user was looking at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// A started checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    /// The pending purchase.
    pub purchase_id: String,
    /// Gateway session id.
    pub session_id: String,
    /// Hosted payment page to redirect to.
    pub checkout_url: String,
}

/// A purchase owned by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct Purchase {
    /// Purchase ID.
    pub id: String,
    /// Tier bought.
    pub tier: Tier,
    /// Lifecycle status.
    pub status: PurchaseStatus,
    /// Remaining credits (`pack_5` only).
    #[serde(default)]
    pub credits_remaining: Option<Credits>,
    /// Item the purchase was started from.
    #[serde(default)]
    pub item_id: Option<String>,
    /// Price in cents.
    pub price_cents: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Filters for [`crate::UnlockClient::list_purchases`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListPurchasesParams {
    /// Only this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
    /// Only this tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Page offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

/// A page of purchases.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPurchasesResponse {
    /// Purchases, newest first.
    pub purchases: Vec<Purchase>,
    /// Whether there are more.
    pub has_more: bool,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// API error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
