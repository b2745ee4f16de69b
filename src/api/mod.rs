//! HTTP API module - REST endpoints and WebSocket

mod conversation;
mod images;
mod onboarding;
mod websocket;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::conversation::ConversationController;
use crate::db::Database;
use crate::flags::Onboarding;
pub use websocket::ServerMessage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub controller: ConversationController,
    pub onboarding: Onboarding,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/ws", get(websocket::ws_handler))
        .merge(conversation::router())
        .merge(onboarding::router())
        .nest("/images", images::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn json(error: impl ToString) -> Json<Self> {
        Json(Self {
            error: error.to_string(),
        })
    }
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "askguide",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let inference = if state.controller.is_configured() {
        "configured"
    } else {
        "missing token"
    };

    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
                inference,
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
                inference,
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    inference: &'static str,
}
