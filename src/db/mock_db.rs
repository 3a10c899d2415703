#![allow(dead_code)]
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::entitlement_repository::EntitlementRepository;
use super::legacy_repository::LegacyUserRepository;
use super::purchase_repository::PurchaseRepository;
use super::usage_repository::UsageRepository;
use super::user_repository::UserRepository;
use crate::models::entitlement::{EntitlementPatch, EntitlementRecord};
use crate::models::legacy::LegacyUser;
use crate::models::purchase::{NewPurchase, Purchase};
use crate::models::tier::SubscriptionTier;
use crate::models::usage::UsageQuotaRecord;
use crate::models::user::BillingUser;

/// In-memory stand-in for every repository, with call counters for assertions.
#[derive(Default)]
pub struct MockDb {
    pub should_fail: bool,
    /// Fails only `increment_usage`, leaving reads and other writes working.
    pub fail_increments: bool,
    pub users: Mutex<HashMap<Uuid, BillingUser>>,
    pub entitlements: Mutex<HashMap<Uuid, EntitlementRecord>>,
    pub usage: Mutex<HashMap<(Uuid, String), UsageQuotaRecord>>,
    pub purchases: Mutex<Vec<Purchase>>,
    pub legacy_users: Mutex<HashMap<String, LegacyUser>>,
    pub reads: Mutex<usize>,
    pub writes: Mutex<usize>,
    pub merge_calls: Mutex<Vec<(Uuid, EntitlementPatch)>>,
    pub set_customer_calls: Mutex<usize>,
}

impl MockDb {
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn failing_increments() -> Self {
        Self {
            fail_increments: true,
            ..Default::default()
        }
    }

    pub fn with_linked_customer(self, user_id: Uuid, customer_id: &str) -> Self {
        let mut user = BillingUser::new(user_id);
        user.stripe_customer_id = Some(customer_id.to_string());
        self.users.lock().unwrap().insert(user_id, user);
        self
    }

    pub fn with_entitlement(self, record: EntitlementRecord) -> Self {
        self.entitlements
            .lock()
            .unwrap()
            .insert(record.user_id, record);
        self
    }

    pub fn entitlement(&self, user_id: Uuid) -> Option<EntitlementRecord> {
        self.entitlements.lock().unwrap().get(&user_id).cloned()
    }

    pub fn user(&self, user_id: Uuid) -> Option<BillingUser> {
        self.users.lock().unwrap().get(&user_id).cloned()
    }

    pub fn storage_calls(&self) -> usize {
        *self.reads.lock().unwrap() + *self.writes.lock().unwrap()
    }

    fn read(&self) -> Result<(), sqlx::Error> {
        *self.reads.lock().unwrap() += 1;
        self.check()
    }

    fn write(&self) -> Result<(), sqlx::Error> {
        *self.writes.lock().unwrap() += 1;
        self.check()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("Mock DB failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn get_user_stripe_customer_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        self.read()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .and_then(|u| u.stripe_customer_id.clone()))
    }

    async fn set_user_stripe_customer_id(
        &self,
        user_id: Uuid,
        stripe_customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        self.write()?;
        *self.set_customer_calls.lock().unwrap() += 1;
        self.users
            .lock()
            .unwrap()
            .entry(user_id)
            .or_insert_with(|| BillingUser::new(user_id))
            .stripe_customer_id = Some(stripe_customer_id.to_string());
        Ok(())
    }

    async fn find_user_id_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        self.read()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|u| u.id))
    }

    async fn update_user_subscription(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        stripe_subscription_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        self.write()?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .entry(user_id)
            .or_insert_with(|| BillingUser::new(user_id));
        user.subscription_tier = tier;
        user.stripe_subscription_id = stripe_subscription_id.map(|s| s.to_string());
        Ok(())
    }
}

#[async_trait]
impl EntitlementRepository for MockDb {
    async fn find_entitlement(
        &self,
        user_id: Uuid,
    ) -> Result<Option<EntitlementRecord>, sqlx::Error> {
        self.read()?;
        Ok(self.entitlements.lock().unwrap().get(&user_id).cloned())
    }

    async fn merge_entitlement(
        &self,
        user_id: Uuid,
        patch: &EntitlementPatch,
    ) -> Result<(), sqlx::Error> {
        self.write()?;
        self.merge_calls
            .lock()
            .unwrap()
            .push((user_id, patch.clone()));
        self.entitlements
            .lock()
            .unwrap()
            .entry(user_id)
            .or_insert_with(|| EntitlementRecord::free(user_id))
            .apply(patch);
        Ok(())
    }
}

#[async_trait]
impl UsageRepository for MockDb {
    async fn get_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
    ) -> Result<Option<UsageQuotaRecord>, sqlx::Error> {
        self.read()?;
        Ok(self
            .usage
            .lock()
            .unwrap()
            .get(&(user_id, period_key.to_string()))
            .cloned())
    }

    async fn increment_usage(
        &self,
        user_id: Uuid,
        period_key: &str,
        used_at: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        self.write()?;
        if self.fail_increments {
            return Err(sqlx::Error::Protocol("Mock increment failure".into()));
        }
        let mut usage = self.usage.lock().unwrap();
        let record = usage
            .entry((user_id, period_key.to_string()))
            .or_insert_with(|| UsageQuotaRecord {
                user_id,
                period_key: period_key.to_string(),
                count: 0,
                last_used_at: None,
            });
        record.count += 1;
        record.last_used_at = Some(used_at);
        Ok(record.count)
    }
}

#[async_trait]
impl PurchaseRepository for MockDb {
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Purchase, sqlx::Error> {
        self.write()?;
        let stored = Purchase {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            product_id: purchase.product_id.clone(),
            payment_id: purchase.payment_id.clone(),
            amount_minor: purchase.amount_minor,
            purchased_at: OffsetDateTime::now_utc(),
        };
        self.purchases.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_purchases_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>, sqlx::Error> {
        self.read()?;
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LegacyUserRepository for MockDb {
    async fn find_legacy_user(&self, email: &str) -> Result<Option<LegacyUser>, sqlx::Error> {
        self.read()?;
        Ok(self.legacy_users.lock().unwrap().get(email).cloned())
    }

    async fn upsert_legacy_user(&self, user: &LegacyUser) -> Result<(), sqlx::Error> {
        self.write()?;
        self.legacy_users
            .lock()
            .unwrap()
            .insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn delete_legacy_user(&self, email: &str) -> Result<bool, sqlx::Error> {
        self.write()?;
        Ok(self.legacy_users.lock().unwrap().remove(email).is_some())
    }
}
