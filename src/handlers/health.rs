//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    environment: String,
    cache: &'static str,
    lookup_configured: bool,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let lookup_configured = state.classifier.lookup_configured();

    Json(HealthResponse {
        status: if lookup_configured { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        environment: state.config.environment.clone(),
        cache: state.classifier.cache_name(),
        lookup_configured,
    })
}
