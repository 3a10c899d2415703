use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use time::OffsetDateTime;
use tracing::{error, info};

use crate::models::autoplot::{ArrowDetection, DetectArrowsRequest, DetectArrowsResponse};
use crate::models::usage::QuotaDecision;
use crate::routes::auth::AuthSession;
use crate::routes::errors::ApiError;
use crate::services::entitlements::period_key;
use crate::state::AppState;

/// Limit for the caller's tier after the grace window has been applied.
async fn current_limit(
    state: &AppState,
    session: &AuthSession,
    now: OffsetDateTime,
) -> Result<i64, ApiError> {
    let record = state.entitlements.read(session.user_id).await?;
    Ok(state.quota.limit_for_tier(record.effective_tier(now)))
}

pub async fn status(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, ApiError> {
    let now = OffsetDateTime::now_utc();
    let limit = current_limit(&state, &session, now).await?;
    let status = state
        .quota
        .status(session.user_id, &period_key(now), limit)
        .await?;
    Ok(Json(status).into_response())
}

/// Metered arrow detection. The scan counts against the quota only when arrows were detected.
pub async fn detect(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<DetectArrowsRequest>,
) -> Result<Response, ApiError> {
    if body.missing_fields() {
        return Err(ApiError::validation("Missing required fields"));
    }

    let now = OffsetDateTime::now_utc();
    let period = period_key(now);
    let limit = current_limit(&state, &session, now).await?;

    if let QuotaDecision::Denied(reason) = state
        .quota
        .check_and_consume(session.user_id, &period, limit)
        .await?
    {
        return Err(ApiError::QuotaExceeded(reason.to_string()));
    }

    let detection = state.vision.detect_arrows(&body).await.map_err(|err| {
        error!(?err, user_id = %session.user_id, "arrow detection failed");
        ApiError::Upstream("Arrow detection failed".into())
    })?;

    let arrows = match detection {
        ArrowDetection::Rejected(reason) => {
            info!(user_id = %session.user_id, %reason, "arrow detection rejected image");
            return Ok(Json(DetectArrowsResponse::failed(reason)).into_response());
        }
        ArrowDetection::Detected(arrows) => arrows,
    };

    let count = state
        .quota
        .increment(session.user_id, &period)
        .await
        .map_err(|err| {
            error!(?err, user_id = %session.user_id, %period, "failed to record auto-plot scan");
            ApiError::Internal("Failed to record scan".into())
        })?;
    info!(user_id = %session.user_id, %period, count, "auto-plot scan recorded");

    Ok(Json(DetectArrowsResponse::detected(arrows)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::MockDb;
    use crate::models::entitlement::EntitlementRecord;
    use crate::models::tier::SubscriptionTier;
    use crate::models::usage::UsageQuotaRecord;
    use crate::routes::auth::claims::Claims;
    use crate::services::stripe::MockStripeService;
    use crate::services::vision::MockVisionService;
    use crate::state::test_support::test_state;
    use axum::extract::State as AxumState;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use time::Duration;
    use uuid::Uuid;

    fn session_for(user_id: Uuid) -> AuthSession {
        AuthSession {
            user_id,
            claims: Claims {
                id: user_id.to_string(),
                email: None,
                exp: 0,
                role: None,
                iss: String::new(),
                aud: String::new(),
            },
        }
    }

    fn request() -> DetectArrowsRequest {
        DetectArrowsRequest {
            shot_image: "aGVsbG8=".into(),
            target_type: "wa_122".into(),
            ..Default::default()
        }
    }

    fn seed_usage(db: &MockDb, user_id: Uuid, count: i64) {
        let period = period_key(OffsetDateTime::now_utc());
        db.usage.lock().unwrap().insert(
            (user_id, period.clone()),
            UsageQuotaRecord {
                user_id,
                period_key: period,
                count,
                last_used_at: None,
            },
        );
    }

    fn usage_count(db: &MockDb, user_id: Uuid) -> i64 {
        let period = period_key(OffsetDateTime::now_utc());
        db.usage
            .lock()
            .unwrap()
            .get(&(user_id, period))
            .map(|r| r.count)
            .unwrap_or(0)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn successful_scan_increments_usage() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        let vision = Arc::new(MockVisionService::new());
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()), vision.clone());

        let resp = detect(AxumState(state), session_for(user_id), Json(request()))
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["arrows"].as_array().unwrap().len(), 1);
        assert_eq!(vision.call_count(), 1);
        assert_eq!(usage_count(&db, user_id), 1);
    }

    #[tokio::test]
    async fn failed_increment_is_an_internal_error() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::failing_increments());
        let vision = Arc::new(MockVisionService::new());
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()), vision.clone());

        let result = detect(AxumState(state), session_for(user_id), Json(request())).await;

        assert!(matches!(result, Err(ApiError::Internal(_))));
        assert_eq!(vision.call_count(), 1);
        assert_eq!(usage_count(&db, user_id), 0);
    }

    #[tokio::test]
    async fn free_user_at_limit_is_denied_without_calling_vision() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        seed_usage(&db, user_id, 50);
        let vision = Arc::new(MockVisionService::new());
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()), vision.clone());

        let err = detect(AxumState(state), session_for(user_id), Json(request()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::QuotaExceeded(_)));
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(vision.call_count(), 0);
        assert_eq!(usage_count(&db, user_id), 50);
    }

    #[tokio::test]
    async fn paid_user_is_unlimited() {
        let user_id = Uuid::new_v4();
        let mut record = EntitlementRecord::free(user_id);
        record.tier = SubscriptionTier::Professional;
        let db = Arc::new(MockDb::default().with_entitlement(record));
        seed_usage(&db, user_id, 500);
        let state = test_state(
            db.clone(),
            Arc::new(MockStripeService::new()),
            Arc::new(MockVisionService::new()),
        );

        detect(AxumState(state.clone()), session_for(user_id), Json(request()))
            .await
            .unwrap();
        assert_eq!(usage_count(&db, user_id), 501);

        let json = body_json(status(AxumState(state), session_for(user_id)).await.unwrap()).await;
        assert_eq!(json["limit"], -1);
        assert_eq!(json["remaining"], -1);
        assert_eq!(json["isUnlimited"], true);
    }

    #[tokio::test]
    async fn expired_subscription_falls_back_to_free_limit() {
        let user_id = Uuid::new_v4();
        let mut record = EntitlementRecord::free(user_id);
        let lapsed = OffsetDateTime::now_utc() - Duration::days(10);
        record.tier = SubscriptionTier::Competitor;
        record.expires_at = Some(lapsed);
        record.grace_ends_at = Some(lapsed + Duration::hours(72));
        let db = Arc::new(MockDb::default().with_entitlement(record));
        seed_usage(&db, user_id, 50);
        let state = test_state(
            db,
            Arc::new(MockStripeService::new()),
            Arc::new(MockVisionService::new()),
        );

        let err = detect(AxumState(state), session_for(user_id), Json(request()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn rejected_image_does_not_count() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        let state = test_state(
            db.clone(),
            Arc::new(MockStripeService::new()),
            Arc::new(MockVisionService::rejecting("No target face found")),
        );

        let resp = detect(AxumState(state), session_for(user_id), Json(request()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No target face found");
        assert_eq!(usage_count(&db, user_id), 0);
    }

    #[tokio::test]
    async fn vision_outage_is_upstream_and_does_not_count() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        let state = test_state(
            db.clone(),
            Arc::new(MockStripeService::new()),
            Arc::new(MockVisionService::failing()),
        );

        let err = detect(AxumState(state), session_for(user_id), Json(request()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(usage_count(&db, user_id), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_storage() {
        let db = Arc::new(MockDb::default());
        let vision = Arc::new(MockVisionService::new());
        let state = test_state(db.clone(), Arc::new(MockStripeService::new()), vision.clone());

        let err = detect(
            AxumState(state),
            session_for(Uuid::new_v4()),
            Json(DetectArrowsRequest::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(db.storage_calls(), 0);
        assert_eq!(vision.call_count(), 0);
    }

    #[tokio::test]
    async fn status_reports_remaining_for_free_user() {
        let user_id = Uuid::new_v4();
        let db = Arc::new(MockDb::default());
        seed_usage(&db, user_id, 12);
        let state = test_state(
            db,
            Arc::new(MockStripeService::new()),
            Arc::new(MockVisionService::new()),
        );

        let json = body_json(status(AxumState(state), session_for(user_id)).await.unwrap()).await;
        assert_eq!(json["scanCount"], 12);
        assert_eq!(json["limit"], 50);
        assert_eq!(json["remaining"], 38);
        assert_eq!(json["periodKey"], period_key(OffsetDateTime::now_utc()));
    }
}
