//! Text-to-image inference
//!
//! Provides:
//! - `ImageGenerator`, the seam the conversation controller calls through
//! - `InferenceClient`, the hosted inference API implementation
//!
//! Wire format: `POST {endpoint}/models/{model}` with a bearer token and a
//! JSON body `{"inputs": "<prompt>"}`. A 2xx response body is the raw image.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ApiToken, Config};
use crate::images::{ImageRef, ImageRefError};

/// Longest error body excerpt kept when the endpoint sends non-JSON errors
const MAX_ERROR_EXCERPT: usize = 200;

/// Why a generation produced no image
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("inference API token not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API error: {status} - {message}")]
    Endpoint { status: u16, message: String },

    #[error("failed to decode image: {0}")]
    Decode(#[from] ImageRefError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

/// Anything that can turn a prompt into an image
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for `prompt`, giving up when `cancel` fires
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, GenerationError>;

    /// Whether generation can be attempted at all
    fn is_configured(&self) -> bool {
        true
    }
}

/// Request body
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<InferenceOptions>,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Hosted inference API client
#[derive(Debug)]
pub struct InferenceClient {
    /// HTTP client
    client: Client,
    /// Bearer token
    api_token: Option<ApiToken>,
    /// Fully-qualified model URL
    model_url: String,
    /// Per-request deadline
    timeout: Duration,
    /// Send `options.wait_for_model`
    wait_for_model: bool,
}

impl InferenceClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = config.request_timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            model_url: config.model_url(),
            timeout,
            wait_for_model: config.wait_for_model,
        })
    }

    /// Model URL requests are sent to
    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    fn classify(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Transport(error.to_string())
        }
    }

    async fn request(&self, token: &ApiToken, prompt: &str) -> Result<ImageRef, GenerationError> {
        let request = InferenceRequest {
            inputs: prompt,
            options: self
                .wait_for_model
                .then_some(InferenceOptions { wait_for_model: true }),
        };

        debug!("Sending image generation request to {}", self.model_url);

        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(token.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Inference API error: {} - {}", status, body);
            return Err(GenerationError::Endpoint {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!("Received {} byte image payload", body.len());

        Ok(ImageRef::decode(body.to_vec(), content_type.as_deref())?)
    }
}

#[async_trait]
impl ImageGenerator for InferenceClient {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, GenerationError> {
        let token = self
            .api_token
            .as_ref()
            .ok_or(GenerationError::NotConfigured)?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = self.request(token, prompt) => result,
        }
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

/// Pull a readable message out of an error body.
///
/// The hosted API answers errors with `{"error": "..."}` (sometimes a list
/// of strings); anything else is truncated verbatim.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("error") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(serde_json::Value::Array(items)) => {
                let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
                if !parts.is_empty() {
                    return parts.join("; ");
                }
            }
            _ => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
}
