//! Entitlement reconciliation: price to tier resolution, customer identity links, the
//! entitlement store, the metered usage quota, and the billing webhook state machine.

mod error;
mod identity;
mod processor;
mod quota;
mod store;
mod tiers;

pub use error::EntitlementError;
pub use identity::IdentityLinker;
pub use processor::{IgnoreReason, ProcessOutcome, WebhookProcessor};
pub use quota::{period_key, UsageQuota, DEFAULT_FREE_MONTHLY_LIMIT};
pub use store::EntitlementStore;
pub use tiers::{OneTimeProducts, PriceTierMap, PriceTierParseError};
