//! Stripe integration for one-off purchases.
//!
//! Stripe handles:
//! - Hosted Checkout sessions for each tier
//! - Webhook events that complete, fail or refund purchases

pub mod client;
pub mod types;

pub use client::{StripeClient, StripeError};
pub use types::*;
