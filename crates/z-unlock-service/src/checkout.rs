//! Checkout seam between the purchase flow and a payment gateway.

use async_trait::async_trait;

use z_unlock_core::{PurchaseId, Tier, UserId};

/// What the gateway needs to start a payment for one purchase.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// The pending purchase this payment completes.
    pub purchase_id: PurchaseId,
    /// The buyer.
    pub user_id: UserId,
    /// What is being bought.
    pub tier: Tier,
    /// The item the purchase was started from, if any.
    pub item_id: Option<String>,
    /// Where the gateway sends the user after paying.
    pub success_url: String,
    /// Where the gateway sends the user after cancelling.
    pub cancel_url: String,
}

/// A payment session the user can be redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Gateway session id, echoed back in webhooks.
    pub session_id: String,
    /// URL of the hosted payment page.
    pub url: String,
}

/// Errors from a checkout provider.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The gateway rejected or failed the request.
    #[error("checkout provider error: {0}")]
    Provider(String),
}

/// Starts hosted payment sessions.
///
/// Invoked only for users without access.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a payment session for a pending purchase.
    async fn initiate_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError>;
}
