use super::{
    CheckoutLineItem, CheckoutLineItemInfo, CheckoutMode, CheckoutSession,
    CreateCheckoutSessionRequest, PortalSession, StripeEvent, StripeService, StripeServiceError,
    SubscriptionInfo,
};
use super::webhook;
use async_trait::async_trait;
use uuid::Uuid;

pub struct LiveStripeService {
    client: stripe::Client,
    webhook_secret: String,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone(), settings.webhook_secret.clone())
    }
}

fn map_mode(mode: CheckoutMode) -> stripe::CheckoutSessionMode {
    match mode {
        CheckoutMode::Payment => stripe::CheckoutSessionMode::Payment,
        CheckoutMode::Subscription => stripe::CheckoutSessionMode::Subscription,
    }
}

fn map_line_items(items: &[CheckoutLineItem]) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price: Some(li.price.clone()),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

fn parse_id<T>(raw: &str) -> Result<T, StripeServiceError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| StripeServiceError::Other(e.to_string()))
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(map_mode(req.mode));
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        if let Some(ref customer) = req.customer {
            params.customer = Some(parse_id::<stripe::CustomerId>(customer)?);
        }
        if let Some(ref meta) = req.metadata {
            params.metadata = Some(
                meta.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
        }
        if req.allow_promotion_codes {
            params.allow_promotion_codes = Some(true);
        }
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items));
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    async fn create_customer(
        &self,
        email: Option<&str>,
        user_id: Uuid,
    ) -> Result<String, StripeServiceError> {
        let mut params = stripe::CreateCustomer::new();
        params.email = email;
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        params.metadata = Some(metadata);
        let customer = stripe::Customer::create(&self.client, params).await?;
        Ok(customer.id.to_string())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeServiceError> {
        let cid = parse_id::<stripe::CustomerId>(customer_id)?;
        let mut params = stripe::CreateBillingPortalSession::new(cid);
        params.return_url = Some(return_url);
        let session = stripe::BillingPortalSession::create(&self.client, params).await?;
        Ok(PortalSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        webhook::verify_signature(payload, signature_header, &self.webhook_secret, now)?;
        webhook::event_from_payload(payload)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let sub_id = parse_id::<stripe::SubscriptionId>(subscription_id)?;
        let sub = stripe::Subscription::retrieve(&self.client, &sub_id, &[]).await?;
        let price_id = sub
            .items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.to_string());
        Ok(SubscriptionInfo {
            id: sub.id.to_string(),
            status: sub.status.to_string(),
            customer_id: Some(sub.customer.id().to_string()),
            price_id,
            current_period_end: sub.current_period_end,
        })
    }

    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<CheckoutLineItemInfo>, StripeServiceError> {
        let session_id = parse_id::<stripe::CheckoutSessionId>(session_id)?;
        let session =
            stripe::CheckoutSession::retrieve(&self.client, &session_id, &["line_items"]).await?;
        let items = session.line_items.map(|list| list.data).unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|item| {
                let price = item.price.as_ref();
                CheckoutLineItemInfo {
                    price_id: price.map(|p| p.id.to_string()),
                    product_id: price
                        .and_then(|p| p.product.as_ref())
                        .map(|product| product.id().to_string()),
                    quantity: item.quantity,
                    amount_total: item.amount_total,
                }
            })
            .collect())
    }
}
