use axum::{
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

use lead_relay::config::Config;
use lead_relay::db::Database;
use lead_relay::handlers::{self, AppState};
use lead_relay::meta_client::MetaClient;
use lead_relay::webhook_handler;

/// Main entry point.
///
/// Initializes tracing, configuration, the database pool, the Conversions
/// API client and the in-flight dispatch guard, then starts the Axum
/// server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // In-flight dispatch guard (5 minute TTL covers any single dispatch;
    // entries are normally invalidated as soon as processing finishes)
    let inflight = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("In-flight dispatch guard initialized");

    // Conversions API client
    let meta_client = MetaClient::new(config.meta_base_url.clone(), config.meta_pixel_id.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize Conversions API client: {}", e))?;
    tracing::info!("Conversions API client initialized: {}", config.meta_base_url);

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        meta_client,
        inflight,
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
        // Lead change-notification webhook (from the database trigger)
        .route(
            "/api/v1/webhooks/leads",
            post(webhook_handler::lead_webhook),
        )
        // Dashboard read surface
        .route("/api/v1/events/logs", get(handlers::event_logs))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (single-row notifications)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
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
