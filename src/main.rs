//! URL Threat Classification Server
//!
//! `POST /analyze` classifies a batch of URLs against Google Safe Browsing,
//! backed by a Redis cache and local heuristics.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use url_threat_service::{
    cache,
    classifier::{Classifier, ClassifierOptions},
    config::Config,
    safe_browsing::SafeBrowsingClient,
    create_router, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_logging(&config);

    tracing::info!("URL threat service starting...");
    tracing::debug!("Configuration: {:?}", config);

    if config.api_key.is_none() {
        tracing::warn!("API_KEY not set, /analyze will refuse lookups");
    }

    let lookup = SafeBrowsingClient::new(
        config.safe_browsing_url.clone(),
        config.api_key.clone(),
        config.request_timeout(),
    )
    .context("Failed to create HTTP client")?;

    let cache = cache::from_config(&config).await;

    let classifier = Classifier::new(
        Arc::new(lookup),
        cache,
        ClassifierOptions {
            cache_ttl: config.cache_ttl(),
            heuristics_enabled: config.heuristics_enabled,
            suspicious_domains: config.suspicious_domains.clone(),
        },
    );
    tracing::info!("Classifier ready (cache: {})", classifier.cache_name());

    // Build application state
    let state = AppState {
        classifier: Arc::new(classifier),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "url_threat_service=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or_else(|_| config.is_production());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
