//! REST API server
//!
//! `GET /` for liveness, `POST /chat` for questions.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::orchestrator::Orchestrator;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Handlers
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Welcome to the VnStock Agent API!"
    }))
}

async fn chat(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> Response {
    info!(input_len = req.input.len(), "Received chat request");

    match state.orchestrator.process_query(&req.input).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ChatResponse {
                output: result.output,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Chat request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(orchestrator: Arc<Orchestrator>, port: u16) -> crate::Result<()> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
