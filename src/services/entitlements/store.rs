use std::sync::Arc;
use uuid::Uuid;

use super::EntitlementError;
use crate::db::entitlement_repository::EntitlementRepository;
use crate::db::user_repository::UserRepository;
use crate::models::entitlement::{EntitlementPatch, EntitlementRecord};

/// Authoritative per-user access record. Writes are merges only.
#[derive(Clone)]
pub struct EntitlementStore {
    entitlements: Arc<dyn EntitlementRepository>,
    users: Arc<dyn UserRepository>,
}

impl EntitlementStore {
    pub fn new(
        entitlements: Arc<dyn EntitlementRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            entitlements,
            users,
        }
    }

    /// Missing records read as the default free record.
    pub async fn read(&self, user_id: Uuid) -> Result<EntitlementRecord, EntitlementError> {
        Ok(self
            .entitlements
            .find_entitlement(user_id)
            .await?
            .unwrap_or_else(|| EntitlementRecord::free(user_id)))
    }

    /// Applies the patch, then mirrors tier changes onto the user row.
    pub async fn merge(
        &self,
        user_id: Uuid,
        patch: &EntitlementPatch,
    ) -> Result<(), EntitlementError> {
        self.entitlements.merge_entitlement(user_id, patch).await?;
        if let Some(tier) = patch.tier {
            let subscription_id = patch.billing_subscription_id.value().map(String::as_str);
            self.users
                .update_user_subscription(user_id, tier, subscription_id)
                .await?;
        }
        Ok(())
    }
}
