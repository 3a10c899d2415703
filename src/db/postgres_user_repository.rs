use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::db::user_repository::UserRepository;
use crate::models::tier::SubscriptionTier;

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get_user_stripe_customer_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        let rec = sqlx::query_scalar::<Postgres, Option<String>>(
            "SELECT stripe_customer_id FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.flatten())
    }

    async fn set_user_stripe_customer_id(
        &self,
        user_id: Uuid,
        stripe_customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        // The auth system owns user rows; upsert so a link is never lost to a late sync.
        sqlx::query::<Postgres>(
            r#"
            INSERT INTO users (id, stripe_customer_id)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET stripe_customer_id = EXCLUDED.stripe_customer_id,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(stripe_customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_id_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let rec = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM users WHERE stripe_customer_id = $1 LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn update_user_subscription(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        stripe_subscription_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query::<Postgres>(
            r#"
            INSERT INTO users (id, subscription_tier, stripe_subscription_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET subscription_tier = EXCLUDED.subscription_tier,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(tier.as_str())
        .bind(stripe_subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
