use async_trait::async_trait;
use uuid::Uuid;

use crate::models::entitlement::{EntitlementPatch, EntitlementRecord};

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn find_entitlement(
        &self,
        user_id: Uuid,
    ) -> Result<Option<EntitlementRecord>, sqlx::Error>;

    /// Upserts the record, touching only the fields the patch carries. There is no replace.
    async fn merge_entitlement(
        &self,
        user_id: Uuid,
        patch: &EntitlementPatch,
    ) -> Result<(), sqlx::Error>;
}
