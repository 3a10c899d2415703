use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use archer_billing::{
    config::Config,
    db::{
        postgres_entitlement_repository::PostgresEntitlementRepository,
        postgres_legacy_repository::PostgresLegacyUserRepository,
        postgres_purchase_repository::PostgresPurchaseRepository,
        postgres_usage_repository::PostgresUsageRepository,
        postgres_user_repository::PostgresUserRepository,
    },
    responses::JsonResponse,
    routes,
    services::{stripe::LiveStripeService, vision::HttpVisionService},
    state::{AppState, Repositories},
};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use reqwest::Client;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer())
        .init();
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("Failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("Failed to verify database connection")?;

    info!("Successfully connected to the database");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_json);

    let _sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_ms)
            .burst_size(config.rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .context("Invalid rate limiter configuration")?,
    );

    // Background task to cleanup old IPs
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let pg_pool = establish_connection(&config.database_url).await?;
    let repos = Repositories {
        users: Arc::new(PostgresUserRepository {
            pool: pg_pool.clone(),
        }),
        entitlements: Arc::new(PostgresEntitlementRepository {
            pool: pg_pool.clone(),
        }),
        usage: Arc::new(PostgresUsageRepository {
            pool: pg_pool.clone(),
        }),
        purchases: Arc::new(PostgresPurchaseRepository {
            pool: pg_pool.clone(),
        }),
        legacy: Arc::new(PostgresLegacyUserRepository { pool: pg_pool }),
    };

    let http_client = Client::new();
    let stripe = Arc::new(LiveStripeService::from_settings(&config.stripe));
    let vision = Arc::new(HttpVisionService::from_settings(
        http_client,
        &config.vision,
    ));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("Invalid FRONTEND_ORIGIN")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let addr = config.bind_addr;
    let state = AppState::new(Arc::new(config), repos, stripe, vision);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf,
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    #[cfg(feature = "tls")]
    {
        let cert = std::env::var("DEV_CERT_LOCATION").context("DEV_CERT_LOCATION must be set")?;
        let key = std::env::var("DEV_KEY_LOCATION").context("DEV_KEY_LOCATION must be set")?;
        let tls_config = RustlsConfig::from_pem_file(cert, key)
            .await
            .context("Failed to load TLS certs")?;

        info!(%addr, "listening with TLS");
        axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening without TLS");
        axum::serve(listener, make_service).await?;
        Ok(())
    }
}
