use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::EntitlementError;
use crate::db::user_repository::UserRepository;
use crate::services::stripe::StripeService;

/// Bidirectional link between internal users and billing customers.
#[derive(Clone)]
pub struct IdentityLinker {
    users: Arc<dyn UserRepository>,
    stripe: Arc<dyn StripeService>,
}

impl IdentityLinker {
    pub fn new(users: Arc<dyn UserRepository>, stripe: Arc<dyn StripeService>) -> Self {
        Self { users, stripe }
    }

    /// Returns the stored customer id, creating and persisting one on first use.
    ///
    /// Two concurrent first calls for the same user can both create an upstream customer; the
    /// later write wins the link and the other customer is left orphaned.
    pub async fn get_or_create_billing_customer(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<String, EntitlementError> {
        if let Some(existing) = self.billing_customer(user_id).await? {
            return Ok(existing);
        }

        let customer_id = self.stripe.create_customer(email, user_id).await?;
        self.users
            .set_user_stripe_customer_id(user_id, &customer_id)
            .await?;
        info!(%user_id, customer_id = %customer_id, "created billing customer");
        Ok(customer_id)
    }

    /// Stored customer id, without creating one.
    pub async fn billing_customer(&self, user_id: Uuid) -> Result<Option<String>, EntitlementError> {
        Ok(self
            .users
            .get_user_stripe_customer_id(user_id)
            .await?
            .filter(|id| !id.is_empty()))
    }

    pub async fn find_user_by_billing_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Uuid>, EntitlementError> {
        let found = self
            .users
            .find_user_id_by_stripe_customer_id(customer_id)
            .await?;
        if found.is_none() {
            warn!(customer_id, "no user linked to billing customer");
        }
        Ok(found)
    }

    /// Stores the link when the user has none yet. An existing link is never replaced.
    pub async fn link_if_missing(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), EntitlementError> {
        if self.billing_customer(user_id).await?.is_some() {
            return Ok(());
        }
        self.users
            .set_user_stripe_customer_id(user_id, customer_id)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::services::stripe::MockStripeService;

    #[tokio::test]
    async fn returns_existing_customer_without_calling_provider() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default().with_linked_customer(user_id, "cus_existing"));
        let stripe = Arc::new(MockStripeService::new());
        let linker = IdentityLinker::new(db.clone(), stripe.clone());

        let id = linker
            .get_or_create_billing_customer(user_id, Some("a@b.test"))
            .await
            .unwrap();
        assert_eq!(id, "cus_existing");
        assert!(stripe.created_customers.lock().unwrap().is_empty());
        assert_eq!(*db.set_customer_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn creates_once_then_reuses() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        let stripe = Arc::new(MockStripeService::new());
        let linker = IdentityLinker::new(db.clone(), stripe.clone());

        let first = linker
            .get_or_create_billing_customer(user_id, Some("archer@example.test"))
            .await
            .unwrap();
        let second = linker
            .get_or_create_billing_customer(user_id, None)
            .await
            .unwrap();

        assert_eq!(first, second);
        let created = stripe.created_customers.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0], (Some("archer@example.test".to_string()), user_id));
        assert_eq!(
            db.user(user_id).unwrap().stripe_customer_id.as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test]
    async fn reverse_lookup_reports_not_found_without_error() {
        let db = Arc::new(MockDb::default());
        let linker = IdentityLinker::new(db, Arc::new(MockStripeService::new()));
        let found = linker
            .find_user_by_billing_customer("cus_other_env")
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn upstream_failure_does_not_persist_a_link() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        let linker = IdentityLinker::new(db.clone(), Arc::new(MockStripeService::new().failing_api()));
        let err = linker
            .get_or_create_billing_customer(user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EntitlementError::Upstream(_)));
        assert!(db.user(user_id).is_none());
    }

    #[tokio::test]
    async fn link_if_missing_keeps_existing_link() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default().with_linked_customer(user_id, "cus_first"));
        let linker = IdentityLinker::new(db.clone(), Arc::new(MockStripeService::new()));
        linker.link_if_missing(user_id, "cus_second").await.unwrap();
        assert_eq!(
            db.user(user_id).unwrap().stripe_customer_id.as_deref(),
            Some("cus_first")
        );
    }
}
