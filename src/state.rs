use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::db::{
    entitlement_repository::EntitlementRepository, legacy_repository::LegacyUserRepository,
    purchase_repository::PurchaseRepository, usage_repository::UsageRepository,
    user_repository::UserRepository,
};
use crate::routes::auth::token::TokenVerifier;
use crate::services::entitlements::{
    EntitlementStore, IdentityLinker, UsageQuota, WebhookProcessor,
};
use crate::services::stripe::StripeService;
use crate::services::vision::VisionService;

/// Storage handles the services are assembled from.
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub usage: Arc<dyn UsageRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub legacy: Arc<dyn LegacyUserRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stripe: Arc<dyn StripeService>,
    pub vision: Arc<dyn VisionService>,
    pub legacy_repo: Arc<dyn LegacyUserRepository>,
    pub entitlements: EntitlementStore,
    pub identity: IdentityLinker,
    pub quota: UsageQuota,
    pub webhook_processor: WebhookProcessor,
    pub token_verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        repos: Repositories,
        stripe: Arc<dyn StripeService>,
        vision: Arc<dyn VisionService>,
    ) -> Self {
        let token_verifier = Arc::new(TokenVerifier::new(&config.jwt));
        let entitlements = EntitlementStore::new(repos.entitlements, repos.users.clone());
        let identity = IdentityLinker::new(repos.users, stripe.clone());
        let quota = UsageQuota::new(repos.usage, config.autoplot_free_monthly_scans);
        let webhook_processor = WebhookProcessor::new(
            entitlements.clone(),
            identity.clone(),
            stripe.clone(),
            repos.purchases,
            Arc::new(config.price_tiers.clone()),
            Arc::new(config.one_time_products.clone()),
        );

        Self {
            config,
            stripe,
            vision,
            legacy_repo: repos.legacy,
            entitlements,
            identity,
            quota,
            webhook_processor,
            token_verifier,
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.token_verifier.clone()
    }
}
