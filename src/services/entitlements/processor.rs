use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{EntitlementError, EntitlementStore, IdentityLinker, OneTimeProducts, PriceTierMap};
use crate::db::purchase_repository::PurchaseRepository;
use crate::models::billing_event::{
    BillingEvent, BillingEventKind, CheckoutCompleted, CheckoutSessionMode, InvoiceSummary,
    SubscriptionSnapshot,
};
use crate::models::entitlement::EntitlementPatch;
use crate::models::purchase::NewPurchase;
use crate::models::tier::SubscriptionTier;
use crate::services::stripe::StripeService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Checkout carried no user id and its customer is not linked.
    UnknownUser,
    /// Customer belongs to no user here (often another environment).
    UnresolvedCustomer,
    MissingSubscription,
    /// Paid subscription without a usable period end.
    MissingPeriodEnd,
    UnhandledType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Activated {
        user_id: Uuid,
        tier: SubscriptionTier,
    },
    PurchaseRecorded {
        user_id: Uuid,
        products: Vec<String>,
        one_time_unlocked: bool,
    },
    Downgraded {
        user_id: Uuid,
    },
    Unchanged,
    Ignored(IgnoreReason),
}

fn period_end(unix_seconds: Option<i64>) -> Option<OffsetDateTime> {
    unix_seconds
        .filter(|secs| *secs > 0)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
}

/// Applies verified billing events to entitlements. Every transition writes freshly computed
/// values, so redelivery of an event converges on the same record.
#[derive(Clone)]
pub struct WebhookProcessor {
    store: EntitlementStore,
    identity: IdentityLinker,
    stripe: Arc<dyn StripeService>,
    purchases: Arc<dyn PurchaseRepository>,
    prices: Arc<PriceTierMap>,
    one_time_products: Arc<OneTimeProducts>,
}

impl WebhookProcessor {
    pub fn new(
        store: EntitlementStore,
        identity: IdentityLinker,
        stripe: Arc<dyn StripeService>,
        purchases: Arc<dyn PurchaseRepository>,
        prices: Arc<PriceTierMap>,
        one_time_products: Arc<OneTimeProducts>,
    ) -> Self {
        Self {
            store,
            identity,
            stripe,
            purchases,
            prices,
            one_time_products,
        }
    }

    pub async fn process(&self, event: &BillingEvent) -> Result<ProcessOutcome, EntitlementError> {
        let outcome = match &event.kind {
            BillingEventKind::CheckoutCompleted(checkout) => {
                self.on_checkout_completed(checkout).await?
            }
            BillingEventKind::SubscriptionUpdated(sub) => self.on_subscription_updated(sub).await?,
            BillingEventKind::SubscriptionDeleted(sub) => self.on_subscription_deleted(sub).await?,
            BillingEventKind::InvoicePaymentFailed(invoice) => {
                self.on_invoice_payment_failed(invoice).await?
            }
            BillingEventKind::Other(evt_type) => {
                info!(event_id = %event.id, evt_type = %evt_type, "unhandled billing event type");
                ProcessOutcome::Ignored(IgnoreReason::UnhandledType)
            }
        };
        info!(event_id = %event.id, ?outcome, "billing event processed");
        Ok(outcome)
    }

    async fn user_for_customer(
        &self,
        customer_id: Option<&str>,
    ) -> Result<Option<Uuid>, EntitlementError> {
        match customer_id {
            Some(customer_id) => self.identity.find_user_by_billing_customer(customer_id).await,
            None => Ok(None),
        }
    }

    async fn on_checkout_completed(
        &self,
        checkout: &CheckoutCompleted,
    ) -> Result<ProcessOutcome, EntitlementError> {
        let user_id = match checkout.user_id {
            Some(user_id) => user_id,
            None => match self.user_for_customer(checkout.customer_id.as_deref()).await? {
                Some(user_id) => user_id,
                None => {
                    warn!(
                        session_id = %checkout.session_id,
                        "checkout completed without a resolvable user"
                    );
                    return Ok(ProcessOutcome::Ignored(IgnoreReason::UnknownUser));
                }
            },
        };

        if let Some(customer_id) = checkout.customer_id.as_deref() {
            self.identity.link_if_missing(user_id, customer_id).await?;
        }

        match checkout.mode {
            CheckoutSessionMode::Subscription => {
                let Some(subscription_id) = checkout.subscription_id.as_deref() else {
                    warn!(%user_id, session_id = %checkout.session_id, "subscription checkout without subscription id");
                    return Ok(ProcessOutcome::Ignored(IgnoreReason::MissingSubscription));
                };
                let sub = self.stripe.retrieve_subscription(subscription_id).await?;
                let tier = self
                    .prices
                    .resolve_tier(sub.price_id.as_deref().unwrap_or_default());
                let expires_at = period_end(Some(sub.current_period_end));
                if tier.is_paid() && expires_at.is_none() {
                    warn!(
                        %user_id,
                        subscription_id = %sub.id,
                        "paid subscription without period end"
                    );
                    return Ok(ProcessOutcome::Ignored(IgnoreReason::MissingPeriodEnd));
                }
                let customer_id = checkout.customer_id.clone().or(sub.customer_id);
                let patch = EntitlementPatch::activate(tier, customer_id, sub.id, expires_at);
                self.store.merge(user_id, &patch).await?;
                info!(%user_id, %tier, "subscription checkout activated");
                Ok(ProcessOutcome::Activated { user_id, tier })
            }
            CheckoutSessionMode::Payment => self.record_one_time_checkout(user_id, checkout).await,
            CheckoutSessionMode::Setup => Ok(ProcessOutcome::Unchanged),
        }
    }

    async fn record_one_time_checkout(
        &self,
        user_id: Uuid,
        checkout: &CheckoutCompleted,
    ) -> Result<ProcessOutcome, EntitlementError> {
        let items = self
            .stripe
            .list_checkout_line_items(&checkout.session_id)
            .await?;

        let mut products = Vec::new();
        for item in items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            self.purchases
                .record_purchase(&NewPurchase {
                    user_id,
                    product_id: product_id.clone(),
                    payment_id: checkout.payment_intent_id.clone(),
                    amount_minor: item.amount_total,
                })
                .await?;
            products.push(product_id);
        }

        if products.is_empty() {
            warn!(%user_id, session_id = %checkout.session_id, "payment checkout had no products");
        }

        let one_time_unlocked = products
            .iter()
            .any(|product| self.one_time_products.contains(product));
        if one_time_unlocked {
            self.store
                .merge(user_id, &EntitlementPatch::one_time_purchase())
                .await?;
        }
        info!(%user_id, ?products, one_time_unlocked, "one-time purchase recorded");

        Ok(ProcessOutcome::PurchaseRecorded {
            user_id,
            products,
            one_time_unlocked,
        })
    }

    async fn on_subscription_updated(
        &self,
        sub: &SubscriptionSnapshot,
    ) -> Result<ProcessOutcome, EntitlementError> {
        let Some(user_id) = self.user_for_customer(sub.customer_id.as_deref()).await? else {
            return Ok(ProcessOutcome::Ignored(IgnoreReason::UnresolvedCustomer));
        };

        if sub.status.grants_access() {
            let tier = self
                .prices
                .resolve_tier(sub.price_id.as_deref().unwrap_or_default());
            let expires_at = period_end(sub.current_period_end);
            if tier.is_paid() && expires_at.is_none() {
                // Without an end the grant could never lapse.
                warn!(
                    %user_id,
                    subscription_id = %sub.id,
                    "paid subscription without period end"
                );
                return Ok(ProcessOutcome::Ignored(IgnoreReason::MissingPeriodEnd));
            }
            let patch = EntitlementPatch::activate(
                tier,
                sub.customer_id.clone(),
                sub.id.clone(),
                expires_at,
            );
            self.store.merge(user_id, &patch).await?;
            info!(%user_id, %tier, subscription_id = %sub.id, "subscription refreshed");
            return Ok(ProcessOutcome::Activated { user_id, tier });
        }

        if sub.status.is_delinquent() {
            // Access continues through the grace window computed at read time.
            warn!(%user_id, subscription_id = %sub.id, status = sub.status.as_str(), "subscription delinquent");
        } else {
            info!(%user_id, subscription_id = %sub.id, status = sub.status.as_str(), "subscription status left unchanged");
        }
        Ok(ProcessOutcome::Unchanged)
    }

    async fn on_subscription_deleted(
        &self,
        sub: &SubscriptionSnapshot,
    ) -> Result<ProcessOutcome, EntitlementError> {
        let Some(user_id) = self.user_for_customer(sub.customer_id.as_deref()).await? else {
            return Ok(ProcessOutcome::Ignored(IgnoreReason::UnresolvedCustomer));
        };
        self.store
            .merge(user_id, &EntitlementPatch::downgrade())
            .await?;
        info!(%user_id, subscription_id = %sub.id, "subscription cancelled, downgraded to free");
        Ok(ProcessOutcome::Downgraded { user_id })
    }

    async fn on_invoice_payment_failed(
        &self,
        invoice: &InvoiceSummary,
    ) -> Result<ProcessOutcome, EntitlementError> {
        let Some(user_id) = self.user_for_customer(invoice.customer_id.as_deref()).await? else {
            return Ok(ProcessOutcome::Ignored(IgnoreReason::UnresolvedCustomer));
        };
        warn!(%user_id, invoice_id = %invoice.id, "invoice payment failed");
        Ok(ProcessOutcome::Unchanged)
    }
}
