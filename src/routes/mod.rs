pub mod auth;
pub mod autoplot;
pub mod billing;
pub mod errors;
pub mod legacy;
pub mod stripe;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Application routes without transport layers. Rate limiting, CORS and tracing are attached by
/// the binary so the router can be driven directly in tests.
pub fn router(state: AppState) -> Router {
    let billing_routes = Router::new()
        .route("/entitlement", get(billing::get_entitlement))
        .route("/checkout", post(billing::create_checkout_session))
        .route("/portal", post(billing::create_portal_session));

    let autoplot_routes = Router::new()
        .route("/status", get(autoplot::status))
        .route("/detect", post(autoplot::detect));

    let legacy_routes = Router::new()
        .route("/check", post(legacy::check))
        .route(
            "/users",
            post(legacy::add_legacy_user).delete(legacy::remove_legacy_user),
        );

    Router::new()
        // Public webhook route (signature checked, no caller auth)
        .route("/api/stripe/webhook", post(stripe::webhook))
        .nest("/api/billing", billing_routes)
        .nest("/api/autoplot", autoplot_routes)
        .nest("/api/legacy", legacy_routes)
        .with_state(state)
}
