//! Core types and entitlement logic for z-unlock.
//!
//! z-unlock decides whether a user may download a clean (non-watermarked)
//! copy of a premium item, and meters copies drawn from credit packs.
//!
//! - **Identifiers**: `UserId`, `PurchaseId`, `GenerationId`
//! - **Purchases**: `PurchaseRecord`, `Tier`, `PurchaseStatus`
//! - **Credits**: `Credits` (finite count or the unlimited sentinel)
//! - **Entitlement**: `resolve`, `should_watermark`, `AccessDecision`
//! - **Consumption**: `ConsumptionOutcome`, `ConsumptionRecord`
//!
//! # Tiers
//!
//! | Tier | Grants | Metered |
//! |------|--------|---------|
//! | `pack_all` | unlimited copies | no |
//! | `single` | clean copies (see [`entitlement::resolve`]) | no |
//! | `pack_5` | five copies, one credit each | yes |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod consumption;
pub mod credits;
pub mod entitlement;
pub mod error;
pub mod ids;
pub mod purchase;

pub use consumption::{ConsumptionOutcome, ConsumptionRecord};
pub use credits::Credits;
pub use entitlement::{resolve, should_watermark, AccessDecision, AccessSource};
pub use error::{Result, UnlockError};
pub use ids::{GenerationId, IdError, PurchaseId, UserId, MAX_GENERATION_ID_LEN};
pub use purchase::{
    PurchaseRecord, PurchaseStatus, Tier, PACK_5_CREDITS, PACK_5_PRICE_CENTS,
    PACK_ALL_PRICE_CENTS, SINGLE_PRICE_CENTS,
};
