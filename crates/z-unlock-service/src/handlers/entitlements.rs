//! Entitlement handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use z_unlock_core::{should_watermark, AccessDecision};

use super::resolve_for;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Entitlement response.
#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    /// The fresh access decision.
    #[serde(flatten)]
    pub decision: AccessDecision,
    /// Whether a generation right now would be watermarked.
    pub watermark: bool,
}

/// Get the caller's current access decision.
pub async fn get_entitlement(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let decision = resolve_for(&state, auth.user_id).await?;

    tracing::debug!(
        user_id = %auth.user_id,
        has_access = %decision.has_access,
        source = %decision.source.as_str(),
        "Entitlement resolved"
    );

    Ok(Json(EntitlementResponse {
        watermark: should_watermark(&decision),
        decision,
    }))
}
