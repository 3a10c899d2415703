use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;
use uuid::Uuid;

use crate::routes::auth::claims::Claims;
use crate::routes::auth::token::TokenVerifier;
use crate::routes::errors::ApiError;

/// Verified caller identity. Extraction fails with `AuthenticationRequired` before any handler
/// logic (and therefore any storage access) runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub claims: Claims,
}

impl AuthSession {
    pub fn email(&self) -> Option<&str> {
        self.claims
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(auth) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get("auth_token").map(|c| c.value().to_string())
}

impl<S> FromRequestParts<S> for AuthSession
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(ApiError::AuthenticationRequired)?;

        let verifier = <Arc<TokenVerifier> as FromRef<S>>::from_ref(state);
        let claims = verifier.verify(&token).map_err(|err| {
            debug!(?err, "rejected auth token");
            ApiError::AuthenticationRequired
        })?;
        let user_id = Uuid::parse_str(&claims.id).map_err(|_| ApiError::AuthenticationRequired)?;

        Ok(AuthSession { user_id, claims })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        extract::FromRequestParts,
        http::{header, Method, Request},
    };
    use axum_extra::extract::cookie::Cookie;
    use uuid::Uuid;

    use crate::routes::auth::claims::UserRole;
    use crate::routes::auth::session::AuthSession;
    use crate::routes::auth::token::{test_support, TokenVerifier};
    use crate::routes::errors::ApiError;

    fn verifier() -> Arc<TokenVerifier> {
        Arc::new(TokenVerifier::new(&test_support::settings()))
    }

    fn make_jwt(id: &str) -> String {
        let claims = test_support::claims_for(id, Some("test@example.com"), UserRole::User, 3600);
        test_support::sign(&test_support::settings(), claims)
    }

    async fn extract(request: Request<()>) -> Result<AuthSession, ApiError> {
        let mut parts = request.into_parts().0;
        AuthSession::from_request_parts(&mut parts, &verifier()).await
    }

    #[tokio::test]
    async fn test_valid_cookie_extracted() {
        let user_id = Uuid::new_v4();
        let cookie = Cookie::new("auth_token", make_jwt(&user_id.to_string()));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let session = extract(request).await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.email(), Some("test@example.com"));
    }

    #[tokio::test]
    async fn test_valid_bearer_extracted() {
        let user_id = Uuid::new_v4();
        let request = Request::builder()
            .uri("/")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", make_jwt(&user_id.to_string())),
            )
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_missing_token_returns_authentication_required() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(())
            .unwrap();

        let result = extract(request).await;
        assert!(matches!(result, Err(ApiError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn test_invalid_token_returns_authentication_required() {
        let cookie = Cookie::new("auth_token", "invalid.token.here");
        let request = Request::builder()
            .uri("/")
            .header(header::COOKIE, cookie.to_string())
            .body(())
            .unwrap();

        let result = extract(request).await;
        assert!(matches!(result, Err(ApiError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn test_non_uuid_subject_is_rejected() {
        let request = Request::builder()
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", make_jwt("user-123")))
            .body(())
            .unwrap();

        let result = extract(request).await;
        assert!(matches!(result, Err(ApiError::AuthenticationRequired)));
    }
}
