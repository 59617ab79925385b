//! Client error types.

/// Errors that can occur when using the z-unlock client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The user has no entitlement to consume.
    #[error("payment required: {message}")]
    PaymentRequired {
        /// Server message.
        message: String,
    },

    /// The pack was emptied by another session; re-check entitlement.
    #[error("credit exhausted for purchase {purchase_id:?}")]
    CreditExhausted {
        /// The pack that ran dry.
        purchase_id: Option<String>,
    },

    /// The granting purchase is gone (refunded or replaced).
    #[error("entitlement changed for purchase {purchase_id:?}")]
    EntitlementChanged {
        /// The purchase that no longer grants access.
        purchase_id: Option<String>,
    },

    /// Temporary failure; retry with the same generation id.
    #[error("retryable: {message}")]
    Retryable {
        /// Server message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    ///
    /// Covers the server's `retryable` code, requests that timed out or
    /// never connected, and bare gateway statuses (408, 502, 503, 504)
    /// returned without an error body. A timed-out generation may still
    /// have been recorded, so callers must retry with the same id.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retryable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { code, status, .. } => {
                code == "unknown" && matches!(status, 408 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
