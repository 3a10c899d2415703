use async_trait::async_trait;
use uuid::Uuid;

use crate::models::tier::SubscriptionTier;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_stripe_customer_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error>;

    async fn set_user_stripe_customer_id(
        &self,
        user_id: Uuid,
        stripe_customer_id: &str,
    ) -> Result<(), sqlx::Error>;

    async fn find_user_id_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error>;

    /// Mirrors the subscription fields onto the user row for quick access.
    async fn update_user_subscription(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        stripe_subscription_id: Option<&str>,
    ) -> Result<(), sqlx::Error>;
}
