use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Limit value meaning "no ceiling" (paid tiers).
pub const UNLIMITED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UsageQuotaRecord {
    pub user_id: Uuid,
    pub period_key: String,
    pub count: i64,
    pub last_used_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDenial {
    LimitReached { limit: i64 },
}

impl std::fmt::Display for QuotaDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaDenial::LimitReached { limit } => write!(
                f,
                "Monthly scan limit of {limit} reached. Upgrade your plan for unlimited scans."
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { count: i64, limit: i64 },
    Denied(QuotaDenial),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub period_key: String,
    pub scan_count: i64,
    pub limit: i64,
    pub remaining: i64,
    pub is_unlimited: bool,
}

impl QuotaStatus {
    pub fn new(period_key: String, scan_count: i64, limit: i64) -> Self {
        let is_unlimited = limit < 0;
        let remaining = if is_unlimited {
            UNLIMITED
        } else {
            (limit - scan_count).max(0)
        };
        Self {
            period_key,
            scan_count,
            limit: if is_unlimited { UNLIMITED } else { limit },
            remaining,
            is_unlimited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_remaining_and_sentinel() {
        let capped = QuotaStatus::new("2025-01".into(), 12, 50);
        assert_eq!(capped.remaining, 38);
        assert!(!capped.is_unlimited);

        let over = QuotaStatus::new("2025-01".into(), 52, 50);
        assert_eq!(over.remaining, 0);

        let unlimited = QuotaStatus::new("2025-01".into(), 400, UNLIMITED);
        assert_eq!(unlimited.limit, UNLIMITED);
        assert_eq!(unlimited.remaining, UNLIMITED);
        assert!(unlimited.is_unlimited);
    }
}
