//! Generation handlers: the watermark gate plus credit consumption.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use z_unlock_core::{
    should_watermark, AccessDecision, ConsumptionOutcome, GenerationId, IdError,
};

use super::resolve_for;
use crate::auth::AuthUser;
use crate::coordinator::{ConsumptionError, Settlement};
use crate::error::ApiError;
use crate::state::AppState;

/// Generation request.
#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    /// Caller-chosen idempotency key for this artifact.
    pub generation_id: String,
    /// The clean artifact already went out; never fail the request on
    /// consumption errors.
    #[serde(default)]
    pub delivered: bool,
}

/// Whether the credit side of a generation is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionStatus {
    /// Consumption succeeded or was not needed.
    Settled,
    /// Consumption failed after delivery; logged for reconciliation.
    Unsettled,
}

/// Error summary for unsettled consumptions.
#[derive(Debug, Serialize)]
pub struct ConsumptionFailure {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Consumption part of a generation response.
#[derive(Debug, Serialize)]
pub struct ConsumptionView {
    /// Settled or not.
    pub status: ConsumptionStatus,
    /// What was consumed, when settled.
    #[serde(flatten)]
    pub outcome: Option<ConsumptionOutcome>,
    /// Why consumption failed, when unsettled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConsumptionFailure>,
}

impl ConsumptionView {
    fn settled(outcome: ConsumptionOutcome) -> Self {
        Self {
            status: ConsumptionStatus::Settled,
            outcome: Some(outcome),
            error: None,
        }
    }

    fn unsettled(err: &ConsumptionError) -> Self {
        Self {
            status: ConsumptionStatus::Unsettled,
            outcome: None,
            error: Some(ConsumptionFailure {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

/// Generation response.
#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    /// Echo of the request key.
    pub generation_id: GenerationId,
    /// Whether the artifact must carry a watermark.
    pub watermark: bool,
    /// The decision the gate used.
    pub decision: AccessDecision,
    /// Absent when there was no access to consume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption: Option<ConsumptionView>,
}

/// Gate one generation and consume a credit if the source is metered.
///
/// A generation id that already consumed is replayed from the journal:
/// no watermark, no second decrement, and the decision reflects the pack
/// that was charged.
pub async fn record_generation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let generation_id: GenerationId = body
        .generation_id
        .parse()
        .map_err(|e: IdError| ApiError::BadRequest(e.to_string()))?;

    if let Some(record) = state
        .coordinator
        .lookup(auth.user_id, &generation_id)
        .await?
    {
        tracing::debug!(
            user_id = %auth.user_id,
            generation_id = %generation_id,
            "Replaying journalled generation"
        );

        let decision = AccessDecision::pack_5_credit(record.purchase_id, record.remaining_credits);
        return Ok(Json(GenerationResponse {
            generation_id,
            watermark: false,
            decision,
            consumption: Some(ConsumptionView::settled(record.replay())),
        }));
    }

    let decision = resolve_for(&state, auth.user_id).await?;
    let watermark = should_watermark(&decision);

    let consumption = if !decision.has_access {
        None
    } else if body.delivered {
        let settlement = state
            .coordinator
            .settle_after_delivery(auth.user_id, &generation_id, &decision)
            .await;
        Some(match settlement {
            Settlement::Settled(outcome) => ConsumptionView::settled(outcome),
            Settlement::Unsettled(err) => ConsumptionView::unsettled(&err),
        })
    } else {
        let outcome = state
            .coordinator
            .consume(auth.user_id, &generation_id, &decision)
            .await?;
        Some(ConsumptionView::settled(outcome))
    };

    tracing::info!(
        user_id = %auth.user_id,
        generation_id = %generation_id,
        source = %decision.source.as_str(),
        watermark = %watermark,
        delivered = %body.delivered,
        "Generation gated"
    );

    Ok(Json(GenerationResponse {
        generation_id,
        watermark,
        decision,
        consumption,
    }))
}
