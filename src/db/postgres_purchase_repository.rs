use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::purchase_repository::PurchaseRepository;
use crate::models::purchase::{NewPurchase, Purchase};

pub struct PostgresPurchaseRepository {
    pub pool: PgPool,
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Purchase, sqlx::Error> {
        sqlx::query_as::<Postgres, Purchase>(
            r#"
            INSERT INTO purchases (id, user_id, product_id, payment_id, amount_minor, purchased_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING id, user_id, product_id, payment_id, amount_minor, purchased_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(purchase.user_id)
        .bind(&purchase.product_id)
        .bind(purchase.payment_id.as_deref())
        .bind(purchase.amount_minor)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>, sqlx::Error> {
        sqlx::query_as::<Postgres, Purchase>(
            r#"
            SELECT id, user_id, product_id, payment_id, amount_minor, purchased_at
            FROM purchases
            WHERE user_id = $1
            ORDER BY purchased_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}
