//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::{CheckoutSession, StripeErrorResponse};
use crate::checkout::{self, CheckoutError, CheckoutProvider, CheckoutRequest};
use crate::crypto::verify_hmac_sha256_hex;

/// How far a webhook timestamp may drift from our clock.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Invalid webhook signature.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook timestamp outside the tolerance window.
    #[error("Webhook timestamp outside tolerance")]
    StaleTimestamp,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against a different API host (used by tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout session for one purchase.
    ///
    /// The purchase id travels as session metadata and as payment intent
    /// metadata, so both checkout and charge events can be matched back.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let purchase_id = request.purchase_id.to_string();
        let user_id = request.user_id.to_string();

        let mut params = vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", user_id.clone()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.tier.product_name().to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                request.tier.price_cents().to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[purchase_id]", purchase_id.clone()),
            ("metadata[user_id]", user_id),
            ("metadata[tier]", request.tier.as_str().to_string()),
            ("payment_intent_data[metadata][purchase_id]", purchase_id),
        ];

        if let Some(item_id) = &request.item_id {
            params.push(("metadata[item_id]", item_id.clone()));
        }

        tracing::debug!(
            purchase_id = %request.purchase_id,
            tier = %request.tier.as_str(),
            amount_cents = %request.tier.price_cents(),
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn initiate_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<checkout::CheckoutSession, CheckoutError> {
        let session = self
            .create_checkout_session(request)
            .await
            .map_err(|e| CheckoutError::Provider(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| CheckoutError::Provider("Stripe returned no checkout URL".into()))?;

        Ok(checkout::CheckoutSession {
            session_id: session.id,
            url,
        })
    }
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// Header format: `t=timestamp,v1=signature[,v1=signature...]`. Any `v1`
/// entry matching `HMAC-SHA256(secret, "{t}.{payload}")` passes, provided
/// `t` is within five minutes of `now_unix`.
///
/// # Errors
///
/// - [`StripeError::Configuration`] if the header has no timestamp.
/// - [`StripeError::InvalidSignature`] if no signature matches.
/// - [`StripeError::StaleTimestamp`] if the timestamp is out of tolerance.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &str,
    header: &str,
    now_unix: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::Configuration("Missing timestamp".into()))?;

    let signed_payload = format!("{timestamp}.{payload}");
    if !signatures
        .iter()
        .any(|sig| verify_hmac_sha256_hex(secret, &signed_payload, sig))
    {
        return Err(StripeError::InvalidSignature);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::Configuration("Invalid timestamp".into()))?;
    if (now_unix - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(StripeError::StaleTimestamp);
    }

    Ok(())
}
