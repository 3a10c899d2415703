use async_trait::async_trait;

use crate::models::legacy::LegacyUser;

#[async_trait]
pub trait LegacyUserRepository: Send + Sync {
    async fn find_legacy_user(&self, email: &str) -> Result<Option<LegacyUser>, sqlx::Error>;

    async fn upsert_legacy_user(&self, user: &LegacyUser) -> Result<(), sqlx::Error>;

    /// Returns `false` when no entry existed for the email.
    async fn delete_legacy_user(&self, email: &str) -> Result<bool, sqlx::Error>;
}
