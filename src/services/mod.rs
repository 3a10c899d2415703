pub mod entitlements;
pub mod stripe;
pub mod vision;
