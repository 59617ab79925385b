//! Z-Unlock Client SDK.
//!
//! Used by the UI backend to ask whether a copy must be watermarked and to
//! record generations against the user's credits.
//!
//! # Example
//!
//! ```no_run
//! use z_unlock_client::UnlockClient;
//!
//! # async fn example() -> Result<(), z_unlock_client::ClientError> {
//! let client = UnlockClient::new("https://unlock.zero.tech", "user-jwt")?;
//!
//! let entitlement = client.get_entitlement().await?;
//! if entitlement.watermark {
//!     println!("Free copy, watermark it");
//! }
//!
//! // Retries with the same id are safe: a credit is spent at most once.
//! let generation = client.record_generation("doc-42-v3", false).await?;
//! println!("Watermark: {}", generation.watermark);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, UnlockClient};
pub use error::ClientError;
pub use types::*;
