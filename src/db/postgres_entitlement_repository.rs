use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::entitlement_repository::EntitlementRepository;
use crate::models::entitlement::{EntitlementPatch, EntitlementRecord};
use crate::models::tier::SubscriptionTier;

pub struct PostgresEntitlementRepository {
    pub pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EntitlementRow {
    user_id: Uuid,
    tier: String,
    billing_customer_id: Option<String>,
    billing_subscription_id: Option<String>,
    expires_at: Option<OffsetDateTime>,
    grace_ends_at: Option<OffsetDateTime>,
    is_legacy_entitled: bool,
    legacy_email: Option<String>,
    has_one_time_purchase: bool,
}

impl From<EntitlementRow> for EntitlementRecord {
    fn from(row: EntitlementRow) -> Self {
        EntitlementRecord {
            user_id: row.user_id,
            tier: SubscriptionTier::from_str_lossy(&row.tier),
            billing_customer_id: row.billing_customer_id,
            billing_subscription_id: row.billing_subscription_id,
            expires_at: row.expires_at,
            grace_ends_at: row.grace_ends_at,
            is_legacy_entitled: row.is_legacy_entitled,
            legacy_email: row.legacy_email,
            has_one_time_purchase: row.has_one_time_purchase,
        }
    }
}

#[async_trait]
impl EntitlementRepository for PostgresEntitlementRepository {
    async fn find_entitlement(
        &self,
        user_id: Uuid,
    ) -> Result<Option<EntitlementRecord>, sqlx::Error> {
        let row = sqlx::query_as::<Postgres, EntitlementRow>(
            r#"
            SELECT user_id,
                   tier,
                   billing_customer_id,
                   billing_subscription_id,
                   expires_at,
                   grace_ends_at,
                   is_legacy_entitled,
                   legacy_email,
                   has_one_time_purchase
            FROM entitlements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EntitlementRecord::from))
    }

    async fn merge_entitlement(
        &self,
        user_id: Uuid,
        patch: &EntitlementPatch,
    ) -> Result<(), sqlx::Error> {
        // Nullable columns take a (touch, value) pair so that an explicit clear is distinct from
        // leaving the column alone.
        sqlx::query::<Postgres>(
            r#"
            INSERT INTO entitlements (
                user_id, tier, billing_customer_id, billing_subscription_id,
                expires_at, grace_ends_at, is_legacy_entitled, legacy_email,
                has_one_time_purchase, updated_at
            )
            VALUES (
                $1, COALESCE($2, 'free'), $4, $6,
                $8, $10, COALESCE($11, FALSE), $13,
                COALESCE($14, FALSE), now()
            )
            ON CONFLICT (user_id) DO UPDATE SET
                tier = COALESCE($2, entitlements.tier),
                billing_customer_id = CASE WHEN $3 THEN $4 ELSE entitlements.billing_customer_id END,
                billing_subscription_id = CASE WHEN $5 THEN $6 ELSE entitlements.billing_subscription_id END,
                expires_at = CASE WHEN $7 THEN $8 ELSE entitlements.expires_at END,
                grace_ends_at = CASE WHEN $9 THEN $10 ELSE entitlements.grace_ends_at END,
                is_legacy_entitled = COALESCE($11, entitlements.is_legacy_entitled),
                legacy_email = CASE WHEN $12 THEN $13 ELSE entitlements.legacy_email END,
                has_one_time_purchase = COALESCE($14, entitlements.has_one_time_purchase),
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(patch.tier.map(|t| t.as_str()))
        .bind(!patch.billing_customer_id.is_keep())
        .bind(patch.billing_customer_id.value().cloned())
        .bind(!patch.billing_subscription_id.is_keep())
        .bind(patch.billing_subscription_id.value().cloned())
        .bind(!patch.expires_at.is_keep())
        .bind(patch.expires_at.value().copied())
        .bind(!patch.grace_ends_at.is_keep())
        .bind(patch.grace_ends_at.value().copied())
        .bind(patch.is_legacy_entitled)
        .bind(!patch.legacy_email.is_keep())
        .bind(patch.legacy_email.value().cloned())
        .bind(patch.has_one_time_purchase)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
