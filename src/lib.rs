//! URL Threat Classification Service
//!
//! Classifies batches of URLs as malicious or benign.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  URL THREAT SERVICE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐   │
//! │  │  API      │──▶│  Classifier                          │   │
//! │  │  (Axum)   │   │  cache → Safe Browsing → reconcile   │   │
//! │  └───────────┘   │        → heuristics → cache write    │   │
//! │                  └───────┬──────────────────┬───────────┘   │
//! │                          ▼                  ▼               │
//! │                   ┌─────────────┐   ┌───────────────────┐   │
//! │                   │ Redis cache │   │ Safe Browsing v4  │   │
//! │                   └─────────────┘   └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod heuristics;
pub mod models;
pub mod safe_browsing;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<classifier::Classifier>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/analyze", post(handlers::analyze::analyze))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Any origin, method and header, credentials allowed
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
