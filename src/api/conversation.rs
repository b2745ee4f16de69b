//! Conversation endpoints
//!
//! GET  /conversation        - entries and input state
//! POST /conversation        - submit a prompt (generation continues in the background)
//! POST /conversation/cancel - cancel the in-flight generation

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{AppState, ErrorResponse};
use crate::conversation::{ConversationController, ConversationEntry, SubmitError};

/// Build the conversation router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversation", get(list).post(submit))
        .route("/conversation/cancel", post(cancel))
}

/// Prompt submission
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

/// Entry as rendered for chat surfaces
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: u64,
    pub text: String,
    pub timestamp: i64,
    pub display_time: String,
    /// `data:` URI once generated
    pub image: Option<String>,
    /// Raw image route once generated
    pub image_url: Option<String>,
}

impl From<&ConversationEntry> for EntryView {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            id: entry.id,
            text: entry.text.clone(),
            timestamp: entry.timestamp,
            display_time: entry.display_time(),
            image: entry.image.as_ref().map(|image| image.to_data_uri()),
            image_url: entry
                .image
                .as_ref()
                .map(|_| format!("/images/{}", entry.id)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub input_enabled: bool,
    pub entries: Vec<EntryView>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Accept a prompt and run its generation on a background task
pub(super) fn spawn_submission(
    controller: &ConversationController,
    text: &str,
) -> Result<ConversationEntry, SubmitError> {
    let pending = controller.begin(text)?;
    let entry = pending.entry().clone();
    tokio::spawn(pending.run());
    Ok(entry)
}

async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.controller.entries();
    Json(ConversationView {
        input_enabled: state.controller.is_input_enabled(),
        entries: entries.iter().map(EntryView::from).collect(),
    })
}

async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    match spawn_submission(&state.controller, &req.text) {
        Ok(entry) => (StatusCode::ACCEPTED, Json(EntryView::from(&entry))).into_response(),
        Err(e @ SubmitError::EmptyPrompt) => {
            (StatusCode::BAD_REQUEST, ErrorResponse::json(e)).into_response()
        }
        Err(e @ SubmitError::Busy) => (StatusCode::CONFLICT, ErrorResponse::json(e)).into_response(),
    }
}

async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    Json(CancelResponse {
        cancelled: state.controller.cancel_pending(),
    })
}
