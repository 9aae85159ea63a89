//! URL analysis handler

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::{AppState, AppResult};
use crate::models::{AnalyzeRequest, EmptyMatches};

/// Classify a batch of URLs
pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> AppResult<Response> {
    req.validate()?;

    if req.urls.is_empty() {
        return Ok(Json(EmptyMatches::new()).into_response());
    }

    let results = state.classifier.classify(&req.urls).await?;

    Ok(Json(results).into_response())
}
