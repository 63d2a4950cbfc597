use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use crate::ai::{AiPreferences, VibeCheckRequest};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ai/inspire", post(inspire))
        .route("/api/ai/vibe-check", post(vibe_check))
}

/// Suggestions are decorative: if the model is unreachable or unconfigured,
/// the caller gets an empty list and the page still renders.
async fn inspire(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(prefs): Json<AiPreferences>,
) -> AppResult<Json<serde_json::Value>> {
    let suggestions = match state.ai.inspire(&prefs).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!("Inspire request failed: {}", e);
            Vec::new()
        }
    };
    Ok(Json(json!({ "suggestions": suggestions })))
}

async fn vibe_check(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<VibeCheckRequest>,
) -> AppResult<Json<serde_json::Value>> {
    match state.ai.vibe_check(&req).await {
        Ok(feedback) => Ok(Json(json!({ "feedback": feedback }))),
        Err(e) => {
            tracing::warn!("Vibe check failed: {}", e);
            Ok(Json(json!({ "feedback": null })))
        }
    }
}
