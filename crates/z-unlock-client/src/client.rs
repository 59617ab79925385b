//! Z-Unlock HTTP client implementation.

use std::time::Duration;

use reqwest::Client;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, CheckoutRequest, CheckoutResponse, EntitlementResponse, GenerationRequest,
    GenerationResponse, ListPurchasesParams, ListPurchasesResponse, Tier,
};

/// Z-Unlock API client.
///
/// Acts on behalf of one user, identified by the bearer token it was built
/// with.
#[derive(Debug, Clone)]
pub struct UnlockClient {
    client: Client,
    base_url: String,
    access_token: String,
    options: ClientOptions,
}

impl UnlockClient {
    /// Create a new z-unlock client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the z-unlock service (e.g., `"http://z-unlock:8080"`)
    /// * `access_token` - The user's JWT
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, access_token, ClientOptions::default())
    }

    /// Create a new z-unlock client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            options,
        })
    }

    /// Get the user's current entitlement.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_entitlement(&self) -> Result<EntitlementResponse, ClientError> {
        let url = format!("{}/v1/entitlements/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Gate a generation and spend a credit if needed.
    ///
    /// Failures for which [`ClientError::is_retryable`] holds (including
    /// timeouts, where the server may already have recorded the generation)
    /// are retried with exponential backoff using the same `generation_id`,
    /// so at most one credit is spent however many attempts reach the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CreditExhausted`] or
    /// [`ClientError::EntitlementChanged`] when the pack changed under the
    /// caller, and the last retryable error once retries run out.
    pub async fn record_generation(
        &self,
        generation_id: impl Into<String>,
        delivered: bool,
    ) -> Result<GenerationResponse, ClientError> {
        let request = GenerationRequest {
            generation_id: generation_id.into(),
            delivered,
        };

        let mut attempt = 0;
        let mut backoff_ms = self.options.initial_backoff_ms;

        loop {
            match self.post_generation(&request).await {
                Err(e) if e.is_retryable() => {
                    attempt += 1;

                    if attempt > self.options.max_retries {
                        tracing::warn!(
                            generation_id = %request.generation_id,
                            attempt = %attempt,
                            error = %e,
                            "Generation failed after max retries"
                        );
                        return Err(e);
                    }

                    tracing::debug!(
                        generation_id = %request.generation_id,
                        attempt = %attempt,
                        backoff_ms = %backoff_ms,
                        error = %e,
                        "Generation not settled, retrying"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.options.max_backoff_ms);
                }
                result => return result,
            }
        }
    }

    async fn post_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ClientError> {
        let url = format!("{}/v1/generations", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Start a checkout for `tier`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error,
    /// including a conflict when the user is already entitled.
    pub async fn start_checkout(
        &self,
        tier: Tier,
        item_id: Option<String>,
    ) -> Result<CheckoutResponse, ClientError> {
        let url = format!("{}/v1/purchases/checkout", self.base_url);
        let request = CheckoutRequest { tier, item_id };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// List the user's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_purchases(
        &self,
        params: &ListPurchasesParams,
    ) -> Result<ListPurchasesResponse, ClientError> {
        let url = format!("{}/v1/purchases", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let Ok(api_error) = response.json::<ApiErrorResponse>().await else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        let purchase_id = api_error
            .error
            .details
            .as_ref()
            .and_then(|d| d.get("purchase_id"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let message = api_error.error.message;

        // Map specific error codes to typed errors
        Err(match api_error.error.code.as_str() {
            "payment_required" => ClientError::PaymentRequired { message },
            "credit_exhausted" => ClientError::CreditExhausted { purchase_id },
            "entitlement_changed" => ClientError::EntitlementChanged { purchase_id },
            "retryable" => ClientError::Retryable { message },
            code => ClientError::Api {
                code: code.to_string(),
                message,
                status: status.as_u16(),
            },
        })
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Retries of a retryable generation after the first attempt (default: 3).
    pub max_retries: u32,
    /// First backoff in milliseconds; doubles per retry (default: 100).
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds (default: 5000).
    pub max_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
        }
    }
}
