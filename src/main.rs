mod auth;
mod circuit_breaker;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod profile;
mod services;
mod shares;
mod subscription;
mod verification;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the filesystem and serves it with the appropriate
/// content type. Returns a 404 if the file is missing.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, configured to load the spec served by
/// `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Proven Pro API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, caches, external
/// service clients and HTTP routes, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proven_pro_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // OTP challenge store: 5 minute TTL bounds the challenge lifetime, keyed
    // per web session so concurrent sessions do not interfere
    let otp_sessions = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("OTP session store initialized (5m TTL)");

    // Memoized verification percentages (recomputed on read after expiry)
    let verification_percentages = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(50_000)
        .build();
    tracing::info!("Verification percentage cache initialized");

    // External collaborators
    let sms = services::SmsClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize SMS client: {}", e))?;
    tracing::info!("✓ SMS client initialized: {}", config.sms_base_url);

    let mailer = services::MailerClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize mailer client: {}", e))?;
    tracing::info!("✓ Mailer client initialized: {}", config.mailer_base_url);

    let google = services::GoogleAuthClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize Google auth client: {}", e))?;

    let payments = services::PaymentClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize payment client: {}", e))?;
    tracing::info!("✓ Payment client initialized: {}", config.payment_base_url);

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        otp_sessions,
        verification_percentages,
        sms,
        mailer,
        google,
        payments,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Auth
        .route("/api/v1/auth/register", post(handlers::register))
        .route(
            "/api/v1/auth/register/confirm",
            get(handlers::register_confirm),
        )
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/google", post(handlers::google_auth))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/refresh", post(handlers::refresh_token))
        .route(
            "/api/v1/auth/request-password-reset",
            post(handlers::request_password_reset),
        )
        .route(
            "/api/v1/auth/reset-password-confirm",
            post(handlers::confirm_password_reset),
        )
        // Profile
        .route(
            "/api/v1/profile",
            get(handlers::get_profile).post(handlers::update_profile),
        )
        .route("/api/v1/profile/status", get(handlers::profile_status))
        .route("/api/v1/profiles/search", get(handlers::search_profiles))
        // Verification
        .route(
            "/api/v1/verification/status",
            get(handlers::get_verification_status),
        )
        .route(
            "/api/v1/verification/documents",
            post(handlers::upload_verification_document),
        )
        .route(
            "/api/v1/verification/mobile/request",
            post(handlers::request_mobile_verification),
        )
        .route(
            "/api/v1/verification/mobile/confirm",
            post(handlers::verify_mobile_otp),
        )
        .route(
            "/api/v1/admin/verification/decision",
            post(handlers::admin_document_decision),
        )
        // Shares & reviews
        .route("/api/v1/shares", post(handlers::generate_profile_share))
        .route("/api/v1/shares/:token", get(handlers::resolve_profile_share))
        .route(
            "/api/v1/shares/:token/reviews",
            post(handlers::submit_profile_review),
        )
        .route("/api/v1/reviews", get(handlers::get_reviews))
        // Subscription
        .route(
            "/api/v1/subscriptions/checkout",
            post(handlers::create_subscription_payment),
        )
        .route(
            "/api/v1/subscriptions/retry",
            post(handlers::retry_subscription_payment),
        )
        .route(
            "/api/v1/subscriptions/check",
            get(handlers::subscription_check),
        )
        // Payment gateway webhook
        .route("/api/v1/webhooks/payment", post(handlers::payment_webhook))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
