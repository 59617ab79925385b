//! API handlers.

pub mod entitlements;
pub mod generations;
pub mod health;
pub mod purchases;
pub mod webhooks;

use z_unlock_core::{resolve, AccessDecision, UserId};

use crate::error::ApiError;
use crate::ledger::run_store;
use crate::state::AppState;

/// Fetch a user's completed purchases and resolve them.
///
/// Decisions are never cached; every call reads the store.
pub(crate) async fn resolve_for(
    state: &AppState,
    user_id: UserId,
) -> Result<AccessDecision, ApiError> {
    let records =
        run_store(&state.store, move |store| store.fetch_completed_purchases(&user_id)).await?;

    Ok(resolve(&records))
}
