use async_trait::async_trait;
use uuid::Uuid;

use crate::models::purchase::{NewPurchase, Purchase};

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Purchase, sqlx::Error>;

    #[allow(dead_code)]
    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>, sqlx::Error>;
}
