use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use axum::{http::StatusCode, response::Response};
use tracing::{error, info, warn};

use crate::models::billing_event::BillingEvent;
use crate::responses::JsonResponse;
use crate::state::AppState;

fn received() -> Response {
    Json(serde_json::json!({ "received": true })).into_response()
}

/// Billing provider webhook. Signature verification happens before anything is read from or
/// written to storage.
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if app_state.config.stripe.webhook_secret.is_empty() {
        error!("STRIPE_WEBHOOK_SECRET not configured");
        return JsonResponse::server_error("Webhook secret not configured").into_response();
    }

    let sig = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing Stripe-Signature").into_response(),
    };

    let evt = match app_state.stripe.verify_webhook(&body, sig) {
        Ok(e) => e,
        Err(err) => {
            warn!(?err, "stripe webhook verification failed");
            return (StatusCode::BAD_REQUEST, "invalid webhook").into_response();
        }
    };

    let evt_type = evt.r#type.as_str();
    info!(event_id = %evt.id, evt_type, "processing stripe event");

    let event = match BillingEvent::from_payload(&evt.id, evt_type, &evt.payload) {
        Ok(event) => event,
        Err(err) => {
            // Redelivery cannot repair a malformed payload, so acknowledge it.
            warn!(?err, event_id = %evt.id, evt_type, "ignoring malformed stripe event");
            return received();
        }
    };

    match app_state.webhook_processor.process(&event).await {
        Ok(_) => received(),
        Err(err) => {
            error!(?err, event_id = %evt.id, evt_type, "stripe webhook processing failed");
            JsonResponse::server_error("Webhook processing failed").into_response()
        }
    }
}
