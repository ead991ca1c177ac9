//! REST API handlers
//!
//! The worker is invoked synchronously by the platform: each handler
//! runs its task to completion and returns a summary of the outcome.
//! The authoritative result travels over the webhook, not the HTTP
//! response.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use pixgen_core::{validate_identifier, GenerateRequest, TaskStatus, TrainRequest};
use pixgen_tasks::TaskRunner;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub runner: Arc<TaskRunner>,
}

/// Create the API router
pub fn create_router(runner: Arc<TaskRunner>) -> Router {
    let state = Arc::new(AppState { runner });

    Router::new()
        .route("/v1/train", post(train))
        .route("/v1/generate", post(generate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Summary returned to the invoking platform for a train task
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainAck {
    pub status: TaskStatus,
    pub model_id: String,
}

/// Summary returned to the invoking platform for a generate task
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAck {
    pub status: TaskStatus,
    pub image_id: String,
}

/// Fine-tune a LoRA adapter on the uploaded images
async fn train(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainRequest>,
) -> Result<Json<TrainAck>, (StatusCode, String)> {
    validate_identifier(&req.model_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(model_id = %req.model_id, "Accepted training request");

    let model_id = req.model_id.clone();
    let callback = state.runner.run_train(req).await;

    Ok(Json(TrainAck {
        status: callback.status,
        model_id,
    }))
}

/// Generate an image with a previously trained adapter
async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateAck>, (StatusCode, String)> {
    validate_identifier(&req.model_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    validate_identifier(&req.image_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(model_id = %req.model_id, image_id = %req.image_id, "Accepted generation request");

    let image_id = req.image_id.clone();
    let callback = state.runner.run_generate(req).await;

    Ok(Json(GenerateAck {
        status: callback.status,
        image_id,
    }))
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
