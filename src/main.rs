mod aggregator;
mod audit;
mod cache_validator;
mod circuit_breaker;
mod config;
mod errors;
mod export;
mod handlers;
mod models;
mod normalizer;
mod plugins;
mod providers;
mod registry;

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

use crate::aggregator::Aggregator;
use crate::audit::{AuditRecorder, MemoryAuditRecorder, TracingAuditRecorder};
use crate::config::Config;
use crate::normalizer::Normalizer;
use crate::providers::CredentialStore;
use crate::registry::SourceRegistry;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The source registry and credential store.
/// - The analysis pipeline and audit recorder.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_phone_intel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Raw input parser bound to the configured default region
    let normalizer = Normalizer::new(config.default_region.as_deref())?;

    // Build the source registry once; it is read-only from here on
    let registry = Arc::new(
        SourceRegistry::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to build source registry: {}", e))?,
    );
    tracing::info!(
        "Source registry initialized: {} sources ({} enabled)",
        registry.len(),
        registry.enabled().count()
    );

    // Credentials are loaded once per process lifetime
    let credentials = Arc::new(CredentialStore::from_config(&config));

    // Audit trail: in-memory ring (also logged) or log-only when disabled
    let audit_log = Arc::new(MemoryAuditRecorder::new(1_000));
    let audit_recorder: Arc<dyn AuditRecorder> = if config.enable_audit_log {
        audit_log.clone()
    } else {
        tracing::info!("Audit log disabled; events go to tracing only");
        Arc::new(TracingAuditRecorder)
    };

    let aggregator = Aggregator::new(registry.clone(), credentials, audit_recorder);

    // Profile cache keyed by E.164; entries carry a SHA-256 checksum and
    // are revalidated on read
    let profile_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.profile_cache_ttl_secs))
        .max_capacity(50_000)
        .build();
    tracing::info!(
        "Profile cache initialized ({}s TTL, 50k capacity)",
        config.profile_cache_ttl_secs
    );

    // Build application state
    let app_state = Arc::new(crate::handlers::AppState {
        config: config.clone(),
        normalizer,
        registry,
        aggregator,
        audit_log,
        profile_cache,
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
        // Analysis endpoints
        .route("/api/v1/analyze", post(handlers::analyze))
        .route("/api/v1/analyze/batch", post(handlers::analyze_batch))
        .route("/api/v1/analyze/export", post(handlers::export_analysis))
        // Reporting surface
        .route("/api/v1/sources", get(handlers::list_sources))
        .route("/api/v1/audit/recent", get(handlers::recent_audit_events))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20 (prevents DDoS)
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
