use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::usage::UsageQuotaRecord;

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn get_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
    ) -> Result<Option<UsageQuotaRecord>, sqlx::Error>;

    /// Atomically adds one to the counter for `(user_id, period_key)`, creating it on first use.
    /// Returns the new count.
    async fn increment_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
        used_at: OffsetDateTime,
    ) -> Result<i64, sqlx::Error>;
}
