use uuid::Uuid;

use super::tier::SubscriptionTier;

/// Billing-relevant slice of a user row. Users themselves are created by the auth system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

impl BillingUser {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            email: None,
            subscription_tier: SubscriptionTier::Free,
            stripe_customer_id: None,
            stripe_subscription_id: None,
        }
    }
}
