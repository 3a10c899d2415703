use thiserror::Error;
use uuid::Uuid;

// Small helper: nested json lookup
fn jget<'a>(val: &'a serde_json::Value, path: &[&str]) -> Option<&'a serde_json::Value> {
    let mut cur = val;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn extract_str(val: &serde_json::Value, path: &[&str]) -> Option<String> {
    jget(val, path)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn extract_i64(val: &serde_json::Value, path: &[&str]) -> Option<i64> {
    jget(val, path)?.as_i64()
}

/// Expandable references arrive either as a bare id or as an embedded object with an `id`.
fn extract_ref(val: &serde_json::Value, path: &[&str]) -> Option<String> {
    let node = jget(val, path)?;
    node.as_str()
        .or_else(|| node.get("id").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn first_item(object: &serde_json::Value) -> Option<&serde_json::Value> {
    jget(object, &["items", "data"])?.as_array()?.first()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingEvent {
    pub id: String,
    pub kind: BillingEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventKind {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionSnapshot),
    SubscriptionDeleted(SubscriptionSnapshot),
    InvoicePaymentFailed(InvoiceSummary),
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutSessionMode {
    Subscription,
    Payment,
    Setup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub mode: CheckoutSessionMode,
    pub user_id: Option<Uuid>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_total: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
    Other(String),
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "unpaid" => SubscriptionStatus::Unpaid,
            "canceled" => SubscriptionStatus::Canceled,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "paused" => SubscriptionStatus::Paused,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }

    pub fn is_delinquent(&self) -> bool {
        matches!(self, SubscriptionStatus::PastDue | SubscriptionStatus::Unpaid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    /// Unix timestamp (seconds) when the current period ends
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSummary {
    pub id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BillingEventError {
    #[error("{event_type} payload is missing {field}")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },
}

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

impl BillingEvent {
    /// Builds a typed event from a verified provider payload (`{ id, type, data: { object } }`).
    pub fn from_payload(
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Self, BillingEventError> {
        let object = jget(payload, &["data", "object"]).unwrap_or(&serde_json::Value::Null);

        let kind = match event_type {
            CHECKOUT_SESSION_COMPLETED => {
                BillingEventKind::CheckoutCompleted(parse_checkout(object)?)
            }
            SUBSCRIPTION_UPDATED => {
                BillingEventKind::SubscriptionUpdated(parse_subscription(object, SUBSCRIPTION_UPDATED)?)
            }
            SUBSCRIPTION_DELETED => {
                BillingEventKind::SubscriptionDeleted(parse_subscription(object, SUBSCRIPTION_DELETED)?)
            }
            INVOICE_PAYMENT_FAILED => {
                let id = extract_str(object, &["id"]).ok_or(BillingEventError::MissingField {
                    event_type: INVOICE_PAYMENT_FAILED,
                    field: "id",
                })?;
                BillingEventKind::InvoicePaymentFailed(InvoiceSummary {
                    id,
                    customer_id: extract_ref(object, &["customer"]),
                    subscription_id: extract_ref(object, &["subscription"]),
                })
            }
            other => BillingEventKind::Other(other.to_string()),
        };

        Ok(BillingEvent {
            id: event_id.to_string(),
            kind,
        })
    }
}

fn parse_checkout_user_id(object: &serde_json::Value) -> Option<Uuid> {
    // Prefer explicit metadata.user_id
    if let Some(uid) = extract_str(object, &["metadata", "user_id"]) {
        if let Ok(id) = Uuid::parse_str(&uid) {
            return Some(id);
        }
    }
    // Fallback to client_reference_id (set to the user id at checkout creation)
    extract_str(object, &["client_reference_id"]).and_then(|s| Uuid::parse_str(&s).ok())
}

fn parse_checkout(object: &serde_json::Value) -> Result<CheckoutCompleted, BillingEventError> {
    let session_id = extract_str(object, &["id"]).ok_or(BillingEventError::MissingField {
        event_type: CHECKOUT_SESSION_COMPLETED,
        field: "id",
    })?;
    let mode = match extract_str(object, &["mode"]).as_deref() {
        Some("subscription") => CheckoutSessionMode::Subscription,
        Some("payment") => CheckoutSessionMode::Payment,
        Some("setup") => CheckoutSessionMode::Setup,
        _ => {
            return Err(BillingEventError::MissingField {
                event_type: CHECKOUT_SESSION_COMPLETED,
                field: "mode",
            })
        }
    };

    Ok(CheckoutCompleted {
        session_id,
        mode,
        user_id: parse_checkout_user_id(object),
        customer_id: extract_ref(object, &["customer"]),
        subscription_id: extract_ref(object, &["subscription"]),
        payment_intent_id: extract_ref(object, &["payment_intent"]),
        amount_total: extract_i64(object, &["amount_total"]),
    })
}

fn parse_subscription(
    object: &serde_json::Value,
    event_type: &'static str,
) -> Result<SubscriptionSnapshot, BillingEventError> {
    let id = extract_str(object, &["id"]).ok_or(BillingEventError::MissingField {
        event_type,
        field: "id",
    })?;
    let status = extract_str(object, &["status"]).ok_or(BillingEventError::MissingField {
        event_type,
        field: "status",
    })?;
    let item = first_item(object);

    // Newer API versions moved the period bounds onto the subscription item.
    let current_period_end = extract_i64(object, &["current_period_end"])
        .or_else(|| item.and_then(|i| extract_i64(i, &["current_period_end"])));

    Ok(SubscriptionSnapshot {
        id,
        customer_id: extract_ref(object, &["customer"]),
        status: SubscriptionStatus::parse(&status),
        price_id: item.and_then(|i| extract_str(i, &["price", "id"])),
        current_period_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_subscription_checkout_with_metadata_user() {
        let user_id = Uuid::new_v4();
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "mode": "subscription",
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "user_id": user_id.to_string() }
            }}
        });
        let evt = BillingEvent::from_payload("evt_1", CHECKOUT_SESSION_COMPLETED, &payload).unwrap();
        match evt.kind {
            BillingEventKind::CheckoutCompleted(c) => {
                assert_eq!(c.mode, CheckoutSessionMode::Subscription);
                assert_eq!(c.user_id, Some(user_id));
                assert_eq!(c.customer_id.as_deref(), Some("cus_1"));
                assert_eq!(c.subscription_id.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn checkout_falls_back_to_client_reference_id() {
        let user_id = Uuid::new_v4();
        let payload = json!({ "data": { "object": {
            "id": "cs_test_2",
            "mode": "payment",
            "client_reference_id": user_id.to_string(),
            "metadata": { "user_id": "not-a-uuid" },
            "payment_intent": { "id": "pi_1" },
            "amount_total": 1200
        }}});
        let evt = BillingEvent::from_payload("evt_2", CHECKOUT_SESSION_COMPLETED, &payload).unwrap();
        let BillingEventKind::CheckoutCompleted(c) = evt.kind else {
            panic!("expected checkout");
        };
        assert_eq!(c.user_id, Some(user_id));
        assert_eq!(c.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(c.amount_total, Some(1200));
    }

    #[test]
    fn subscription_reads_period_end_from_item_when_top_level_missing() {
        let payload = json!({ "data": { "object": {
            "id": "sub_1",
            "customer": "cus_1",
            "status": "past_due",
            "items": { "data": [ { "price": { "id": "price_a" }, "current_period_end": 1_740_000_000 } ] }
        }}});
        let evt = BillingEvent::from_payload("evt_3", SUBSCRIPTION_UPDATED, &payload).unwrap();
        let BillingEventKind::SubscriptionUpdated(s) = evt.kind else {
            panic!("expected subscription update");
        };
        assert_eq!(s.status, SubscriptionStatus::PastDue);
        assert!(s.status.is_delinquent());
        assert_eq!(s.price_id.as_deref(), Some("price_a"));
        assert_eq!(s.current_period_end, Some(1_740_000_000));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let payload = json!({ "data": { "object": { "customer": "cus_1" } } });
        let err = BillingEvent::from_payload("evt_4", SUBSCRIPTION_DELETED, &payload).unwrap_err();
        assert_eq!(
            err,
            BillingEventError::MissingField {
                event_type: SUBSCRIPTION_DELETED,
                field: "id"
            }
        );
    }

    #[test]
    fn unknown_types_are_kept_as_other() {
        let evt = BillingEvent::from_payload("evt_5", "invoice.paid", &json!({})).unwrap();
        assert_eq!(evt.kind, BillingEventKind::Other("invoice.paid".into()));
    }
}
