use jsonwebtoken::{decode, errors::Error, Algorithm, DecodingKey, Validation};

use crate::config::JwtSettings;
use crate::routes::auth::claims::Claims;

/// Verifies caller tokens minted by the identity service (HS256, issuer and audience pinned).
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        Ok(decode::<Claims>(token, &self.key, &self.validation)?.claims)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::routes::auth::claims::UserRole;

    #[test]
    fn accepts_token_for_configured_issuer_and_audience() {
        let settings = settings();
        let token = sign(
            &settings,
            claims_for("user-1", Some("archer@example.com"), UserRole::Admin, 60),
        );

        let claims = TokenVerifier::new(&settings).verify(&token).unwrap();
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.email.as_deref(), Some("archer@example.com"));
        assert!(claims.is_admin());
    }

    #[test]
    fn rejects_token_for_another_audience() {
        let settings = settings();
        let other = JwtSettings {
            audience: "someone-else".into(),
            ..settings.clone()
        };
        let token = sign(&other, claims_for("user-1", None, UserRole::User, 60));
        assert!(TokenVerifier::new(&settings).verify(&token).is_err());
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let settings = settings();
        let other = JwtSettings {
            secret: "fedcba9876543210fedcba9876543210".into(),
            ..settings.clone()
        };
        let token = sign(&other, claims_for("user-1", None, UserRole::User, 60));
        assert!(TokenVerifier::new(&settings).verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let settings = settings();
        let token = sign(&settings, claims_for("user-1", None, UserRole::User, -5));
        assert!(TokenVerifier::new(&settings).verify(&token).is_err());
    }
}
