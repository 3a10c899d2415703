use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::services::entitlements::{
    OneTimeProducts, PriceTierMap, PriceTierParseError, DEFAULT_FREE_MONTHLY_LIMIT,
};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_JWT_ISSUER: &str = "archer-auth";
const DEFAULT_JWT_AUDIENCE: &str = "archer-app";
/// Minimum acceptable size for the JWT secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 32;
/// Minimum number of distinct bytes, so repeated-character secrets are refused.
const MIN_UNIQUE_JWT_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
    #[error(transparent)]
    PriceTiers(#[from] PriceTierParseError),
}

#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    /// Empty when webhooks are not configured for this deployment.
    pub webhook_secret: String,
}

#[derive(Clone, Default)]
pub struct VisionSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

fn validate_jwt_secret(secret: String) -> Result<String, ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::Invalid {
            key: "JWT_SECRET",
            message: format!(
                "must be at least {MIN_JWT_SECRET_LENGTH} bytes, but {} bytes were provided",
                secret.len()
            ),
        });
    }

    let unique = secret.bytes().collect::<HashSet<_>>().len();
    if unique < MIN_UNIQUE_JWT_BYTES {
        return Err(ConfigError::Invalid {
            key: "JWT_SECRET",
            message: format!(
                "must contain at least {MIN_UNIQUE_JWT_BYTES} unique bytes; only {unique} found"
            ),
        });
    }

    Ok(secret)
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub stripe: StripeSettings,
    pub price_tiers: PriceTierMap,
    pub one_time_products: OneTimeProducts,
    pub jwt: JwtSettings,
    pub autoplot_free_monthly_scans: i64,
    pub vision: VisionSettings,
    pub rate_limit_ms: u64,
    pub rate_limit_burst: u32,
    pub log_json: bool,
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                key: "BIND_ADDR",
                message: err.to_string(),
            })?;

        let price_tiers = match get("STRIPE_PRICE_TIERS") {
            Some(raw) => PriceTierMap::parse(&raw)?,
            None => PriceTierMap::default(),
        };
        let one_time_products = get("STRIPE_ONE_TIME_PRODUCTS")
            .map(|raw| OneTimeProducts::parse(&raw))
            .unwrap_or_default();

        let autoplot_free_monthly_scans = match get("AUTOPLOT_FREE_MONTHLY_SCANS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|limit| *limit >= 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "AUTOPLOT_FREE_MONTHLY_SCANS",
                    message: format!("expected a non-negative integer, got '{raw}'"),
                })?,
            None => DEFAULT_FREE_MONTHLY_LIMIT,
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            frontend_origin: require("FRONTEND_ORIGIN")?,
            bind_addr,
            stripe: StripeSettings {
                secret_key: require("STRIPE_SECRET_KEY")?,
                webhook_secret: get("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            },
            price_tiers,
            one_time_products,
            jwt: JwtSettings {
                secret: validate_jwt_secret(require("JWT_SECRET")?)?,
                issuer: get("JWT_ISSUER").unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string()),
                audience: get("JWT_AUDIENCE").unwrap_or_else(|| DEFAULT_JWT_AUDIENCE.to_string()),
            },
            autoplot_free_monthly_scans,
            vision: VisionSettings {
                base_url: get("VISION_SERVICE_URL"),
                api_key: get("VISION_SERVICE_API_KEY"),
            },
            // Default: 200ms/token (~5 req/sec)
            rate_limit_ms: get("RATE_LIMITER_MILLISECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(200),
            // Default: allow short bursts during client polling
            rate_limit_burst: get("RATE_LIMITER_BURST")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(20),
            log_json: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::tier::SubscriptionTier;

    #[test]
    fn applies_defaults() {
        let config = test_config();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.autoplot_free_monthly_scans, 50);
        assert_eq!(config.jwt.issuer, DEFAULT_JWT_ISSUER);
        assert_eq!(config.rate_limit_ms, 200);
        assert_eq!(config.rate_limit_burst, 20);
        assert!(!config.log_json);
        assert!(config.vision.base_url.is_none());
        assert!(config.one_time_products.contains("3d_aiming_course"));
        assert_eq!(
            config.price_tiers.resolve_tier("price_1Sr3ETRpdm3uvDfuEEfNt7P1"),
            SubscriptionTier::HustonSchool
        );
    }

    #[test]
    fn missing_required_variable_is_an_error() {
        let mut vars = base_env();
        vars.remove("STRIPE_SECRET_KEY");
        assert!(matches!(
            config_from(vars),
            Err(ConfigError::Missing("STRIPE_SECRET_KEY"))
        ));
    }

    #[test]
    fn webhook_secret_is_optional() {
        let mut vars = base_env();
        vars.remove("STRIPE_WEBHOOK_SECRET");
        assert!(config_from(vars).unwrap().stripe.webhook_secret.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = base_env();
        vars.insert("STRIPE_PRICE_TIERS", "price_x=professional".into());
        vars.insert("AUTOPLOT_FREE_MONTHLY_SCANS", "10".into());
        vars.insert("LOG_FORMAT", "JSON".into());
        vars.insert("BIND_ADDR", "0.0.0.0:8080".into());
        let config = config_from(vars).unwrap();
        assert_eq!(
            config.price_tiers.resolve_tier("price_x"),
            SubscriptionTier::Professional
        );
        assert_eq!(config.autoplot_free_monthly_scans, 10);
        assert!(config.log_json);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut vars = base_env();
        vars.insert("AUTOPLOT_FREE_MONTHLY_SCANS", "-5".into());
        assert!(matches!(
            config_from(vars),
            Err(ConfigError::Invalid {
                key: "AUTOPLOT_FREE_MONTHLY_SCANS",
                ..
            })
        ));

        let mut vars = base_env();
        vars.insert("STRIPE_PRICE_TIERS", "price_x=platinum".into());
        assert!(matches!(config_from(vars), Err(ConfigError::PriceTiers(_))));
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut vars = base_env();
        vars.insert("JWT_SECRET", "too-short".into());
        assert!(matches!(
            config_from(vars),
            Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                ..
            })
        ));
    }

    #[test]
    fn low_entropy_jwt_secret_is_rejected() {
        let mut vars = base_env();
        vars.insert("JWT_SECRET", "a".repeat(MIN_JWT_SECRET_LENGTH));
        let err = config_from(vars).err().unwrap();
        assert!(err.to_string().contains("unique bytes"));
    }

    #[test]
    fn missing_jwt_secret_is_reported_as_missing() {
        let mut vars = base_env();
        vars.insert("JWT_SECRET", "   ".into());
        assert!(matches!(
            config_from(vars),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }
}
