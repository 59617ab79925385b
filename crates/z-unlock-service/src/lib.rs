//! Z-Unlock HTTP API Service.
//!
//! This crate provides the HTTP API for z-unlock, including:
//!
//! - Entitlement checks and the watermark gate
//! - Idempotent credit consumption per generation
//! - Purchase listing, Stripe checkout and admin grants
//! - Stripe webhooks that drive the purchase lifecycle
//!
//! # Consumption
//!
//! [`ConsumptionCoordinator`] has the [`CreditLedger`] spend a credit and
//! journal the generation id in one store call, so retries never spend twice
//! and two sessions racing for a pack's last credit see exactly one success.
//!
//! # Authentication
//!
//! 1. **ZID JWT tokens** - For end-user requests
//! 2. **Admin API key** - For support grants

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router

pub mod auth;
pub mod checkout;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod routes;
pub mod state;
pub mod stripe;

pub use checkout::{CheckoutError, CheckoutProvider, CheckoutRequest, CheckoutSession};
pub use config::{ServiceConfig, StoreBackend};
pub use coordinator::{ConsumptionCoordinator, ConsumptionError, Settlement};
pub use error::ApiError;
pub use ledger::{CreditLedger, LedgerError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
