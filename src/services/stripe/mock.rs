#![allow(dead_code)]
use super::{
    CheckoutLineItemInfo, CheckoutSession, CreateCheckoutSessionRequest, PortalSession,
    StripeEvent, StripeService, StripeServiceError, SubscriptionInfo,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub created_customers: Arc<Mutex<Vec<(Option<String>, Uuid)>>>,
    pub portal_requests: Arc<Mutex<Vec<(String, String)>>>,
    pub events: Arc<Mutex<Vec<StripeEvent>>>,
    pub subscriptions: Arc<Mutex<HashMap<String, SubscriptionInfo>>>,
    pub line_items: Arc<Mutex<HashMap<String, Vec<CheckoutLineItemInfo>>>>,
    pub subscription_lookups: Arc<Mutex<Vec<String>>>,
    pub fail_api: Arc<Mutex<bool>>,
    pub reject_signatures: Arc<Mutex<bool>>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscription(self, sub: SubscriptionInfo) -> Self {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(sub.id.clone(), sub);
        self
    }

    pub fn with_line_items(self, session_id: &str, items: Vec<CheckoutLineItemInfo>) -> Self {
        self.line_items
            .lock()
            .unwrap()
            .insert(session_id.to_string(), items);
        self
    }

    pub fn failing_api(self) -> Self {
        *self.fail_api.lock().unwrap() = true;
        self
    }

    pub fn rejecting_signatures(self) -> Self {
        *self.reject_signatures.lock().unwrap() = true;
        self
    }

    fn check_api(&self) -> Result<(), StripeServiceError> {
        if *self.fail_api.lock().unwrap() {
            return Err(StripeServiceError::Api("mock stripe outage".into()));
        }
        Ok(())
    }
}

static ID_SEQ: AtomicU64 = AtomicU64::new(0);

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}{}", prefix, ts, seq)
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.check_api()?;
        self.last_create_requests.lock().unwrap().push(req.clone());

        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn create_customer(
        &self,
        email: Option<&str>,
        user_id: Uuid,
    ) -> Result<String, StripeServiceError> {
        self.check_api()?;
        self.created_customers
            .lock()
            .unwrap()
            .push((email.map(str::to_string), user_id));
        Ok(make_id("cus_test"))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, StripeServiceError> {
        self.check_api()?;
        self.portal_requests
            .lock()
            .unwrap()
            .push((customer_id.to_string(), return_url.to_string()));
        Ok(PortalSession {
            id: make_id("bps_test"),
            url: "https://example.test/portal".into(),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if *self.reject_signatures.lock().unwrap() {
            return Err(StripeServiceError::Webhook(
                "No signatures found matching the expected signature".into(),
            ));
        }
        let val: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let id = match val.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => make_id("evt"),
        };
        let ty = val
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let evt = StripeEvent {
            id,
            r#type: ty,
            payload: val,
        };
        self.events.lock().unwrap().push(evt.clone());
        Ok(evt)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        self.check_api()?;
        self.subscription_lookups
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                StripeServiceError::NotFound(format!("subscription {} not found", subscription_id))
            })
    }

    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<CheckoutLineItemInfo>, StripeServiceError> {
        self.check_api()?;
        Ok(self
            .line_items
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
