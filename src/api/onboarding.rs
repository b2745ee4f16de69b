//! Onboarding notice endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{AppState, ErrorResponse};
use crate::flags::{ONBOARDING_MESSAGE, ONBOARDING_TITLE};

/// Build onboarding router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/onboarding", get(status))
        .route("/onboarding/ack", post(acknowledge))
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub show: bool,
    pub title: &'static str,
    pub message: &'static str,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    match state.onboarding.needs_notice().await {
        Ok(show) => Json(OnboardingResponse {
            show,
            title: ONBOARDING_TITLE,
            message: ONBOARDING_MESSAGE,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::json(e)).into_response(),
    }
}

async fn acknowledge(State(state): State<AppState>) -> impl IntoResponse {
    match state.onboarding.acknowledge().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::json(e)).into_response(),
    }
}
