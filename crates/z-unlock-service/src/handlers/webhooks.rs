//! Stripe webhook handler.
//!
//! Drives the purchase lifecycle:
//!
//! | Event | Transition |
//! |-------|------------|
//! | `checkout.session.completed` (paid) | pending → completed |
//! | `checkout.session.async_payment_succeeded` | pending → completed |
//! | `checkout.session.expired` | pending → failed |
//! | `checkout.session.async_payment_failed` | pending → failed |
//! | `charge.refunded` (full) | completed → refunded |
//!
//! Redelivered events are no-ops. Events for purchases we don't know, or
//! transitions the lifecycle forbids, are logged and acknowledged so Stripe
//! stops retrying them.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use z_unlock_core::{PurchaseId, PurchaseRecord, PurchaseStatus};
use z_unlock_store::StoreError;

use crate::error::ApiError;
use crate::ledger::run_store;
use crate::state::AppState;
use crate::stripe::client::verify_webhook_signature;
use crate::stripe::{metadata_purchase_id, Charge, CheckoutSession, WebhookEvent};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.stripe_webhook_secret {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        verify_webhook_signature(secret, &body, signature, chrono::Utc::now().timestamp())
            .map_err(|e| {
                tracing::warn!(error = %e, "Invalid Stripe webhook signature");
                ApiError::BadRequest("Invalid webhook signature".into())
            })?;
    } else {
        // No webhook_secret configured - skip verification (development mode)
        tracing::warn!("Stripe webhook_secret not configured - skipping signature verification");
    }

    let event: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session = parse_object::<CheckoutSession>(&event)?;
            if session.is_paid() {
                settle_session(&state, &session, PurchaseStatus::Completed).await?;
            } else {
                tracing::info!(
                    session_id = %session.id,
                    payment_status = ?session.payment_status,
                    "Checkout session not paid yet, skipping"
                );
            }
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            let session = parse_object::<CheckoutSession>(&event)?;
            settle_session(&state, &session, PurchaseStatus::Failed).await?;
        }
        "charge.refunded" => {
            let charge = parse_object::<Charge>(&event)?;
            handle_refund(&state, &charge).await?;
        }
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, ApiError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| ApiError::BadRequest(format!("Malformed {} object: {e}", event.event_type)))
}

async fn settle_session(
    state: &AppState,
    session: &CheckoutSession,
    next: PurchaseStatus,
) -> Result<(), ApiError> {
    let metadata_id = metadata_purchase_id(&session.metadata).map(str::to_string);
    let session_id = session.id.clone();

    let record = run_store(&state.store, move |store| {
        if let Some(id) = metadata_id.and_then(|raw| raw.parse::<PurchaseId>().ok()) {
            if let Some(record) = store.get_purchase(&id)? {
                return Ok(Some(record));
            }
        }
        store.find_purchase_by_session(&session_id)
    })
    .await?;

    let Some(record) = record else {
        tracing::warn!(session_id = %session.id, "No purchase for checkout session");
        return Ok(());
    };

    if let Some(reference) = &session.client_reference_id {
        if *reference != record.user_id.to_string() {
            tracing::warn!(
                session_id = %session.id,
                purchase_id = %record.id,
                "Checkout session user does not match purchase, ignoring"
            );
            return Ok(());
        }
    }

    transition(state, &record, next).await
}

async fn handle_refund(state: &AppState, charge: &Charge) -> Result<(), ApiError> {
    if !charge.refunded {
        tracing::info!(charge_id = %charge.id, "Partial refund, purchase kept");
        return Ok(());
    }

    let Some(purchase_id) = metadata_purchase_id(&charge.metadata)
        .and_then(|raw| raw.parse::<PurchaseId>().ok())
    else {
        tracing::warn!(charge_id = %charge.id, "Refunded charge carries no purchase id");
        return Ok(());
    };

    let record = run_store(&state.store, move |store| store.get_purchase(&purchase_id)).await?;
    let Some(record) = record else {
        tracing::warn!(charge_id = %charge.id, purchase_id = %purchase_id, "No purchase for refunded charge");
        return Ok(());
    };

    transition(state, &record, PurchaseStatus::Refunded).await
}

async fn transition(
    state: &AppState,
    record: &PurchaseRecord,
    next: PurchaseStatus,
) -> Result<(), ApiError> {
    if record.status == next {
        tracing::debug!(purchase_id = %record.id, status = %next.as_str(), "Purchase already in target status");
        return Ok(());
    }

    let id = record.id;
    match run_store(&state.store, move |store| store.transition_purchase(&id, next)).await {
        Ok(updated) => {
            tracing::info!(
                purchase_id = %updated.id,
                user_id = %updated.user_id,
                tier = %updated.tier.as_str(),
                status = %updated.status.as_str(),
                credits = ?updated.credits_remaining,
                "Purchase status updated"
            );
            Ok(())
        }
        Err(StoreError::InvalidTransition { from, to, .. }) => {
            tracing::warn!(
                purchase_id = %id,
                from = %from.as_str(),
                to = %to.as_str(),
                "Ignoring out-of-order purchase event"
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
