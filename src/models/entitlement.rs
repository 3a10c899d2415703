use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::tier::SubscriptionTier;

/// Extra access kept after a subscription period ends, to absorb late renewals.
pub const GRACE_PERIOD_HOURS: i64 = 72;

pub fn grace_period() -> Duration {
    Duration::hours(GRACE_PERIOD_HOURS)
}

/// A single field of a merge write: leave the stored value, clear it, or overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T: Clone> FieldUpdate<T> {
    pub fn apply(&self, current: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => *current = None,
            FieldUpdate::Set(value) => *current = Some(value.clone()),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    /// The value written by this update, `None` for both `Keep` and `Clear`.
    pub fn value(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementRecord {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
    pub grace_ends_at: Option<OffsetDateTime>,
    pub is_legacy_entitled: bool,
    pub legacy_email: Option<String>,
    pub has_one_time_purchase: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    Free,
    Active,
    Grace,
    Expired,
}

impl EntitlementRecord {
    pub fn free(user_id: Uuid) -> Self {
        Self {
            user_id,
            tier: SubscriptionTier::Free,
            billing_customer_id: None,
            billing_subscription_id: None,
            expires_at: None,
            grace_ends_at: None,
            is_legacy_entitled: false,
            legacy_email: None,
            has_one_time_purchase: false,
        }
    }

    pub fn apply(&mut self, patch: &EntitlementPatch) {
        if let Some(tier) = patch.tier {
            self.tier = tier;
        }
        patch.billing_customer_id.apply(&mut self.billing_customer_id);
        patch
            .billing_subscription_id
            .apply(&mut self.billing_subscription_id);
        patch.expires_at.apply(&mut self.expires_at);
        patch.grace_ends_at.apply(&mut self.grace_ends_at);
        if let Some(flag) = patch.is_legacy_entitled {
            self.is_legacy_entitled = flag;
        }
        patch.legacy_email.apply(&mut self.legacy_email);
        if let Some(flag) = patch.has_one_time_purchase {
            self.has_one_time_purchase = flag;
        }
    }

    /// Time-based view of the record. Expiry is enforced here, at read time, rather than by
    /// a sweep job.
    pub fn access_state(&self, now: OffsetDateTime) -> AccessState {
        if !self.tier.is_paid() {
            return AccessState::Free;
        }
        match (self.expires_at, self.grace_ends_at) {
            (None, _) => AccessState::Active,
            (Some(expires_at), _) if now < expires_at => AccessState::Active,
            (Some(_), Some(grace_ends_at)) if now < grace_ends_at => AccessState::Grace,
            _ => AccessState::Expired,
        }
    }

    pub fn effective_tier(&self, now: OffsetDateTime) -> SubscriptionTier {
        match self.access_state(now) {
            AccessState::Active | AccessState::Grace => self.tier,
            AccessState::Free | AccessState::Expired => SubscriptionTier::Free,
        }
    }
}

/// Partial update for an [`EntitlementRecord`]. `None`/`Keep` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub tier: Option<SubscriptionTier>,
    pub billing_customer_id: FieldUpdate<String>,
    pub billing_subscription_id: FieldUpdate<String>,
    pub expires_at: FieldUpdate<OffsetDateTime>,
    pub grace_ends_at: FieldUpdate<OffsetDateTime>,
    pub is_legacy_entitled: Option<bool>,
    pub legacy_email: FieldUpdate<String>,
    pub has_one_time_purchase: Option<bool>,
}

impl EntitlementPatch {
    /// Full subscription field set for an active subscription. The grace window is always
    /// derived from the period end; a free tier never carries an expiry.
    pub fn activate(
        tier: SubscriptionTier,
        billing_customer_id: Option<String>,
        billing_subscription_id: String,
        current_period_end: Option<OffsetDateTime>,
    ) -> Self {
        let (expires_at, grace_ends_at) = match current_period_end {
            Some(end) if tier.is_paid() => (
                FieldUpdate::Set(end),
                FieldUpdate::Set(end + grace_period()),
            ),
            _ => (FieldUpdate::Clear, FieldUpdate::Clear),
        };

        Self {
            tier: Some(tier),
            billing_customer_id: billing_customer_id
                .map(FieldUpdate::Set)
                .unwrap_or_default(),
            billing_subscription_id: FieldUpdate::Set(billing_subscription_id),
            expires_at,
            grace_ends_at,
            ..Default::default()
        }
    }

    pub fn downgrade() -> Self {
        Self {
            tier: Some(SubscriptionTier::Free),
            billing_subscription_id: FieldUpdate::Clear,
            expires_at: FieldUpdate::Clear,
            grace_ends_at: FieldUpdate::Clear,
            ..Default::default()
        }
    }

    pub fn one_time_purchase() -> Self {
        Self {
            has_one_time_purchase: Some(true),
            ..Default::default()
        }
    }

    pub fn legacy(entitled: bool, email: String) -> Self {
        Self {
            is_legacy_entitled: Some(entitled),
            legacy_email: FieldUpdate::Set(email),
            ..Default::default()
        }
    }
}

/// Caller-facing view of an entitlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementStatus {
    pub tier: SubscriptionTier,
    pub effective_tier: SubscriptionTier,
    pub access_state: AccessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_subscription_id: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub grace_ends_at: Option<OffsetDateTime>,
    pub is_legacy_entitled: bool,
    pub has_one_time_purchase: bool,
}

impl EntitlementStatus {
    pub fn from_record(record: &EntitlementRecord, now: OffsetDateTime) -> Self {
        Self {
            tier: record.tier,
            effective_tier: record.effective_tier(now),
            access_state: record.access_state(now),
            billing_customer_id: record.billing_customer_id.clone(),
            billing_subscription_id: record.billing_subscription_id.clone(),
            expires_at: record.expires_at,
            grace_ends_at: record.grace_ends_at,
            is_legacy_entitled: record.is_legacy_entitled,
            has_one_time_purchase: record.has_one_time_purchase,
        }
    }
}
