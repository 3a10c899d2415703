use std::collections::BTreeMap;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::models::entitlement::EntitlementStatus;
use crate::routes::auth::AuthSession;
use crate::routes::errors::ApiError;
use crate::services::stripe::{CheckoutLineItem, CheckoutMode, CreateCheckoutSessionRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionBody {
    #[serde(default)]
    pub price_id: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub success_url: String,
    #[serde(default)]
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSessionBody {
    #[serde(default)]
    pub return_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionUrlResponse {
    pub url: String,
}

fn parse_mode(raw: &str) -> Option<CheckoutMode> {
    match raw.trim() {
        "subscription" => Some(CheckoutMode::Subscription),
        "payment" => Some(CheckoutMode::Payment),
        _ => None,
    }
}

/// Caller's own entitlement; a user without a record reads as free.
pub async fn get_entitlement(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, ApiError> {
    let record = state.entitlements.read(session.user_id).await?;
    let status = EntitlementStatus::from_record(&record, OffsetDateTime::now_utc());
    Ok(Json(status).into_response())
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<CheckoutSessionBody>,
) -> Result<Response, ApiError> {
    let fields = [&body.price_id, &body.mode, &body.success_url, &body.cancel_url];
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ApiError::validation("Missing required fields"));
    }
    let mode = parse_mode(&body.mode).ok_or_else(|| ApiError::validation("Invalid checkout mode"))?;

    let customer_id = state
        .identity
        .get_or_create_billing_customer(session.user_id, session.email())
        .await?;

    let user_id = session.user_id.to_string();
    let request = CreateCheckoutSessionRequest {
        success_url: body.success_url.trim().to_string(),
        cancel_url: body.cancel_url.trim().to_string(),
        mode,
        line_items: vec![CheckoutLineItem {
            price: body.price_id.trim().to_string(),
            quantity: 1,
        }],
        client_reference_id: Some(user_id.clone()),
        customer: Some(customer_id),
        metadata: Some(BTreeMap::from([("user_id".to_string(), user_id)])),
        allow_promotion_codes: mode == CheckoutMode::Subscription,
    };

    let checkout = state.stripe.create_checkout_session(request).await?;
    let Some(url) = checkout.url else {
        error!(session_id = %checkout.id, "checkout session created without a url");
        return Err(ApiError::Upstream("Failed to create checkout session".into()));
    };
    info!(user_id = %session.user_id, session_id = %checkout.id, ?mode, "checkout session created");
    Ok(Json(SessionUrlResponse { url }).into_response())
}

pub async fn create_portal_session(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<PortalSessionBody>,
) -> Result<Response, ApiError> {
    let return_url = body.return_url.trim();
    if return_url.is_empty() {
        return Err(ApiError::validation("Return URL required"));
    }

    let customer_id = state
        .identity
        .billing_customer(session.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No subscription found".into()))?;

    let portal = state
        .stripe
        .create_portal_session(&customer_id, return_url)
        .await?;
    Ok(Json(SessionUrlResponse { url: portal.url }).into_response())
}
