use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::usage_repository::UsageRepository;
use crate::models::usage::UsageQuotaRecord;

pub struct PostgresUsageRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn get_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
    ) -> Result<Option<UsageQuotaRecord>, sqlx::Error> {
        sqlx::query_as::<Postgres, UsageQuotaRecord>(
            r#"
            SELECT user_id, period_key, count, last_used_at
            FROM usage_quota
            WHERE user_id = $1 AND period_key = $2
            "#,
        )
        .bind(user_id)
        .bind(period_key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn increment_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
        used_at: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        // Server-side add: concurrent increments for the same key never lose updates.
        sqlx::query_scalar::<Postgres, i64>(
            r#"
            INSERT INTO usage_quota (user_id, period_key, count, last_used_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id, period_key) DO UPDATE
            SET count = usage_quota.count + 1,
                last_used_at = EXCLUDED.last_used_at
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(period_key)
        .bind(used_at)
        .fetch_one(&self.pool)
        .await
    }
}
