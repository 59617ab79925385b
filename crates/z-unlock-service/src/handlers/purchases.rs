//! Purchase handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use z_unlock_core::{Credits, PurchaseRecord, PurchaseStatus, Tier, UnlockError, UserId};
use z_unlock_store::PurchaseFilter;

use super::resolve_for;
use crate::auth::{AdminAuth, AuthUser};
use crate::checkout::CheckoutRequest;
use crate::error::ApiError;
use crate::ledger::run_store;
use crate::state::AppState;

/// Upper bound on `limit` for purchase listings.
const MAX_PAGE_SIZE: usize = 100;

/// Purchase list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListPurchasesQuery {
    /// Only this status ("pending", "completed", "failed", "refunded").
    pub status: Option<String>,
    /// Only this tier ("single", "pack_5", "pack_all").
    pub tier: Option<String>,
    /// Maximum number of purchases to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl ListPurchasesQuery {
    fn filter(&self) -> Result<PurchaseFilter, ApiError> {
        let bad = |e: UnlockError| ApiError::BadRequest(e.to_string());
        Ok(PurchaseFilter {
            status: self
                .status
                .as_deref()
                .map(str::parse::<PurchaseStatus>)
                .transpose()
                .map_err(bad)?,
            tier: self
                .tier
                .as_deref()
                .map(str::parse::<Tier>)
                .transpose()
                .map_err(bad)?,
        })
    }
}

/// Purchase as shown to its owner.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// Purchase ID.
    pub id: String,
    /// Tier bought.
    pub tier: Tier,
    /// Lifecycle status.
    pub status: PurchaseStatus,
    /// Remaining credits (`pack_5` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<Credits>,
    /// Item the purchase was started from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Price in cents.
    pub price_cents: i64,
    /// Creation time (RFC 3339).
    pub created_at: String,
    /// Last update time (RFC 3339).
    pub updated_at: String,
}

impl From<&PurchaseRecord> for PurchaseResponse {
    fn from(record: &PurchaseRecord) -> Self {
        Self {
            id: record.id.to_string(),
            tier: record.tier,
            status: record.status,
            credits_remaining: record.credits_remaining,
            item_id: record.item_id.clone(),
            price_cents: record.tier.price_cents(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// List purchases response.
#[derive(Debug, Serialize)]
pub struct ListPurchasesResponse {
    /// Purchases (newest first).
    pub purchases: Vec<PurchaseResponse>,
    /// Whether there are more purchases.
    pub has_more: bool,
}

/// List the caller's purchases.
pub async fn list_purchases(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<Json<ListPurchasesResponse>, ApiError> {
    let filter = query.filter()?;
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let offset = query.offset;
    let user_id = auth.user_id;

    // Fetch one more than requested to determine has_more
    let records = run_store(&state.store, move |store| {
        store.list_purchases_by_user(&user_id, filter, limit + 1, offset)
    })
    .await?;

    let has_more = records.len() > limit;
    let purchases = records.iter().take(limit).map(PurchaseResponse::from).collect();

    Ok(Json(ListPurchasesResponse {
        purchases,
        has_more,
    }))
}

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct StartCheckoutRequest {
    /// Tier to buy.
    pub tier: Tier,
    /// Item the user was looking at.
    #[serde(default)]
    pub item_id: Option<String>,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct StartCheckoutResponse {
    /// The pending purchase.
    pub purchase_id: String,
    /// Gateway session id.
    pub session_id: String,
    /// Hosted payment page.
    pub checkout_url: String,
}

/// Start a purchase for a user without access.
///
/// A pending record is written before the gateway is called so the
/// completion webhook always finds it. If the gateway fails the record is
/// marked failed.
pub async fn start_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<StartCheckoutRequest>,
) -> Result<Json<StartCheckoutResponse>, ApiError> {
    let checkout = state
        .checkout
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Checkout not configured".into()))?;

    let decision = resolve_for(&state, auth.user_id).await?;
    if decision.has_access {
        return Err(ApiError::Conflict(format!(
            "Already entitled via {}",
            decision.source.as_str()
        )));
    }

    let record = PurchaseRecord::pending(auth.user_id, body.tier, body.item_id);
    let pending = record.clone();
    run_store(&state.store, move |store| store.put_purchase(&pending)).await?;

    let (success_url, cancel_url) = state.config.checkout_redirects();
    let request = CheckoutRequest {
        purchase_id: record.id,
        user_id: auth.user_id,
        tier: record.tier,
        item_id: record.item_id.clone(),
        success_url,
        cancel_url,
    };

    tracing::info!(
        user_id = %auth.user_id,
        purchase_id = %record.id,
        tier = %record.tier.as_str(),
        "Initiating checkout"
    );

    let session = match checkout.initiate_checkout(&request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(purchase_id = %record.id, error = %e, "Failed to create checkout session");
            let id = record.id;
            if let Err(mark_err) = run_store(&state.store, move |store| {
                store.transition_purchase(&id, PurchaseStatus::Failed)
            })
            .await
            {
                tracing::warn!(purchase_id = %id, error = %mark_err, "Failed to mark purchase failed");
            }
            return Err(ApiError::ExternalService(format!(
                "Failed to create checkout session: {e}"
            )));
        }
    };

    // A webhook may already have completed the purchase; only the session id is written.
    let id = record.id;
    let session_id = session.session_id.clone();
    run_store(&state.store, move |store| {
        store.set_checkout_session(&id, &session_id)
    })
    .await?;

    tracing::info!(
        purchase_id = %record.id,
        session_id = %session.session_id,
        "Checkout session created"
    );

    Ok(Json(StartCheckoutResponse {
        purchase_id: record.id.to_string(),
        session_id: session.session_id,
        checkout_url: session.url,
    }))
}

/// Admin grant request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Recipient.
    pub user_id: String,
    /// Tier to grant.
    pub tier: Tier,
    /// Make a `pack_5` grant unlimited.
    #[serde(default)]
    pub unlimited: bool,
    /// Override the starting balance of a `pack_5` grant.
    #[serde(default)]
    pub credits: Option<Credits>,
    /// Optional item reference.
    #[serde(default)]
    pub item_id: Option<String>,
    /// Reason (for the audit log).
    #[serde(default)]
    pub reason: Option<String>,
}

/// Grant a completed purchase without payment (support tooling).
pub async fn admin_grant(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    if body.tier != Tier::Pack5 && (body.unlimited || body.credits.is_some()) {
        return Err(ApiError::BadRequest(
            "credits and unlimited apply to pack_5 only".into(),
        ));
    }

    let mut record = PurchaseRecord::pending(user_id, body.tier, body.item_id);
    record.unlimited = body.unlimited;
    record
        .transition(PurchaseStatus::Completed)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Some(credits) = body.credits.filter(|_| !body.unlimited) {
        record.credits_remaining = Some(credits);
    }

    let stored = record.clone();
    run_store(&state.store, move |store| store.put_purchase(&stored)).await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %user_id,
        purchase_id = %record.id,
        tier = %record.tier.as_str(),
        credits = ?record.credits_remaining,
        reason = ?body.reason,
        "Purchase granted by admin"
    );

    Ok(Json(PurchaseResponse::from(&record)))
}
