//! Application state.

use std::sync::Arc;

use z_unlock_store::Store;

use crate::auth::JwksCache;
use crate::checkout::CheckoutProvider;
use crate::config::ServiceConfig;
use crate::coordinator::ConsumptionCoordinator;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Consumption coordinator (owns the credit ledger).
    pub coordinator: ConsumptionCoordinator,

    /// Payment gateway for checkout (optional).
    pub checkout: Option<Arc<dyn CheckoutProvider>>,

    /// Signing keys for user JWTs.
    pub jwks: Arc<JwksCache>,
}

impl AppState {
    /// Create application state, enabling Stripe checkout when configured.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let checkout = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe checkout enabled");
                    Some(Arc::new(client) as Arc<dyn CheckoutProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if checkout.is_none() {
            tracing::warn!("Stripe not configured - purchases cannot be started");
        }

        Self::with_checkout(store, config, checkout)
    }

    /// Create application state with an explicit checkout provider.
    #[must_use]
    pub fn with_checkout(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        checkout: Option<Arc<dyn CheckoutProvider>>,
    ) -> Self {
        Self {
            coordinator: ConsumptionCoordinator::new(Arc::clone(&store)),
            store,
            config,
            checkout,
            jwks: Arc::new(JwksCache::new()),
        }
    }

    /// Check if a checkout provider is configured.
    #[must_use]
    pub fn has_checkout(&self) -> bool {
        self.checkout.is_some()
    }
}
