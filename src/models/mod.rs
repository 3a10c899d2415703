pub mod autoplot;
pub mod billing_event;
pub mod entitlement;
pub mod legacy;
pub mod purchase;
pub mod tier;
pub mod usage;
pub mod user;
