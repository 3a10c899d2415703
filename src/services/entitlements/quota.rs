use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::EntitlementError;
use crate::db::usage_repository::UsageRepository;
use crate::models::tier::SubscriptionTier;
use crate::models::usage::{QuotaDecision, QuotaDenial, QuotaStatus, UNLIMITED};

pub const DEFAULT_FREE_MONTHLY_LIMIT: i64 = 50;

/// Calendar-month bucket (`YYYY-MM`, UTC) a usage count is tracked under.
pub fn period_key(now: OffsetDateTime) -> String {
    let now = now.to_offset(time::UtcOffset::UTC);
    format!("{:04}-{:02}", now.year(), u8::from(now.month()))
}

/// Per-user, per-period metered usage with a tier-dependent ceiling.
///
/// Consumption is two-phase: `check_and_consume` is advisory and `increment` is called only
/// after the metered work succeeded. Concurrent calls near the ceiling may overshoot it by at
/// most the number of in-flight requests minus one.
#[derive(Clone)]
pub struct UsageQuota {
    usage: Arc<dyn UsageRepository>,
    free_limit: i64,
}

impl UsageQuota {
    pub fn new(usage: Arc<dyn UsageRepository>, free_limit: i64) -> Self {
        Self { usage, free_limit }
    }

    pub fn limit_for_tier(&self, tier: SubscriptionTier) -> i64 {
        if tier.is_paid() {
            UNLIMITED
        } else {
            self.free_limit
        }
    }

    async fn current_count(&self, user_id: Uuid, period_key: &str) -> Result<i64, EntitlementError> {
        Ok(self
            .usage
            .get_usage(user_id, period_key)
            .await?
            .map(|record| record.count)
            .unwrap_or(0))
    }

    pub async fn check_and_consume(
        &self,
        user_id: Uuid,
        period_key: &str,
        limit: i64,
    ) -> Result<QuotaDecision, EntitlementError> {
        let count = self.current_count(user_id, period_key).await?;
        if limit < 0 || count < limit {
            return Ok(QuotaDecision::Allowed { count, limit });
        }
        info!(%user_id, period_key, count, limit, "usage quota exhausted");
        Ok(QuotaDecision::Denied(QuotaDenial::LimitReached { limit }))
    }

    /// Server-side atomic add. Not idempotent: call once per successful operation.
    pub async fn increment(&self, user_id: Uuid, period_key: &str) -> Result<i64, EntitlementError> {
        Ok(self
            .usage
            .increment_usage(user_id, period_key, OffsetDateTime::now_utc())
            .await?)
    }

    pub async fn status(
        &self,
        user_id: Uuid,
        period_key: &str,
        limit: i64,
    ) -> Result<QuotaStatus, EntitlementError> {
        let count = self.current_count(user_id, period_key).await?;
        Ok(QuotaStatus::new(period_key.to_string(), count, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use time::macros::datetime;

    fn quota(db: &Arc<MockDb>) -> UsageQuota {
        UsageQuota::new(db.clone(), DEFAULT_FREE_MONTHLY_LIMIT)
    }

    #[test]
    fn period_key_is_utc_year_month() {
        assert_eq!(period_key(datetime!(2025-01-31 23:59 UTC)), "2025-01");
        assert_eq!(period_key(datetime!(2025-02-01 01:00 +03:00)), "2025-01");
        assert_eq!(period_key(datetime!(2025-12-15 12:00 UTC)), "2025-12");
    }

    #[test]
    fn paid_tiers_are_unlimited() {
        let q = quota(&Arc::new(MockDb::default()));
        assert_eq!(q.limit_for_tier(SubscriptionTier::Free), 50);
        assert_eq!(q.limit_for_tier(SubscriptionTier::Competitor), UNLIMITED);
        assert_eq!(q.limit_for_tier(SubscriptionTier::HustonSchool), UNLIMITED);
    }

    #[tokio::test]
    async fn fiftieth_use_is_allowed_and_fifty_first_denied() {
        let db = Arc::new(MockDb::default());
        let q = quota(&db);
        let user_id = Uuid::new_v4();

        for expected in 0..50 {
            let decision = q.check_and_consume(user_id, "2025-01", 50).await.unwrap();
            assert_eq!(
                decision,
                QuotaDecision::Allowed {
                    count: expected,
                    limit: 50
                }
            );
            assert_eq!(q.increment(user_id, "2025-01").await.unwrap(), expected + 1);
        }

        let denied = q.check_and_consume(user_id, "2025-01", 50).await.unwrap();
        assert_eq!(
            denied,
            QuotaDecision::Denied(QuotaDenial::LimitReached { limit: 50 })
        );
    }

    #[tokio::test]
    async fn usage_does_not_carry_into_next_period() {
        let db = Arc::new(MockDb::default());
        let q = quota(&db);
        let user_id = Uuid::new_v4();
        for _ in 0..50 {
            q.increment(user_id, "2025-01").await.unwrap();
        }
        assert!(!q.check_and_consume(user_id, "2025-01", 50).await.unwrap().is_allowed());
        assert_eq!(
            q.check_and_consume(user_id, "2025-02", 50).await.unwrap(),
            QuotaDecision::Allowed { count: 0, limit: 50 }
        );
    }

    #[tokio::test]
    async fn check_does_not_advance_the_counter() {
        let db = Arc::new(MockDb::default());
        let q = quota(&db);
        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            q.check_and_consume(user_id, "2025-01", 50).await.unwrap();
        }
        assert_eq!(q.status(user_id, "2025-01", 50).await.unwrap().scan_count, 0);
        assert_eq!(*db.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn unlimited_ignores_count() {
        let db = Arc::new(MockDb::default());
        let q = quota(&db);
        let user_id = Uuid::new_v4();
        for _ in 0..60 {
            q.increment(user_id, "2025-01").await.unwrap();
        }
        assert!(q
            .check_and_consume(user_id, "2025-01", UNLIMITED)
            .await
            .unwrap()
            .is_allowed());
        let status = q.status(user_id, "2025-01", UNLIMITED).await.unwrap();
        assert_eq!(status.scan_count, 60);
        assert_eq!(status.remaining, UNLIMITED);
        assert!(status.is_unlimited);
    }
}
