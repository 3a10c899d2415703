use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use time::OffsetDateTime;
use tracing::info;

use crate::models::entitlement::EntitlementPatch;
use crate::models::legacy::{
    normalize_email, AddLegacyUserRequest, LegacyAccessResponse, LegacyCheckRequest, LegacyUser,
    RemoveLegacyUserRequest, LEGACY_AIMING_COURSE,
};
use crate::responses::JsonResponse;
use crate::routes::auth::AuthSession;
use crate::routes::errors::ApiError;
use crate::services::entitlements::EntitlementError;
use crate::state::AppState;

fn require_admin(session: &AuthSession) -> Result<(), ApiError> {
    if session.claims.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".into()))
    }
}

/// Looks up pre-billing access by email. The entitlement flag is only written when the checked
/// email belongs to the caller.
pub async fn check(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<LegacyCheckRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&body.email);
    if email.is_empty() {
        return Err(ApiError::validation("Email required"));
    }

    let Some(legacy) = state
        .legacy_repo
        .find_legacy_user(&email)
        .await
        .map_err(EntitlementError::from)?
    else {
        return Ok(Json(LegacyAccessResponse {
            has_legacy_access: false,
            granted_products: Vec::new(),
        })
        .into_response());
    };

    let owns_email = session
        .email()
        .map(|own| normalize_email(own) == email)
        .unwrap_or(false);
    if owns_email && !legacy.products.is_empty() {
        let entitled = legacy.grants(LEGACY_AIMING_COURSE);
        state
            .entitlements
            .merge(session.user_id, &EntitlementPatch::legacy(entitled, email.clone()))
            .await?;
        info!(user_id = %session.user_id, products = ?legacy.products, "legacy access granted");
    }

    Ok(Json(LegacyAccessResponse {
        has_legacy_access: true,
        granted_products: legacy.products,
    })
    .into_response())
}

pub async fn add_legacy_user(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<AddLegacyUserRequest>,
) -> Result<Response, ApiError> {
    require_admin(&session)?;

    let email = normalize_email(&body.email);
    let products: Vec<String> = body
        .products
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if email.is_empty() || products.is_empty() {
        return Err(ApiError::validation("Email and products required"));
    }

    let user = LegacyUser {
        email,
        products,
        notes: body.notes.filter(|n| !n.trim().is_empty()),
        granted_at: Some(OffsetDateTime::now_utc()),
        added_by: Some(session.user_id),
    };
    state
        .legacy_repo
        .upsert_legacy_user(&user)
        .await
        .map_err(EntitlementError::from)?;
    info!(
        email = %user.email,
        products = ?user.products,
        added_by = %session.user_id,
        "legacy user added"
    );

    Ok(JsonResponse::success("Legacy user saved").into_response())
}

pub async fn remove_legacy_user(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<RemoveLegacyUserRequest>,
) -> Result<Response, ApiError> {
    require_admin(&session)?;

    let email = normalize_email(&body.email);
    if email.is_empty() {
        return Err(ApiError::validation("Email required"));
    }

    let removed = state
        .legacy_repo
        .delete_legacy_user(&email)
        .await
        .map_err(EntitlementError::from)?;
    if !removed {
        return Err(ApiError::NotFound("Legacy user not found".into()));
    }
    info!(%email, removed_by = %session.user_id, "legacy user removed");

    Ok(JsonResponse::success("Legacy user removed").into_response())
}
