//! Common test utilities - AskGuideTest harness for end-to-end testing
//!
//! - `FakeInference` - scripted stand-in for the hosted inference API
//! - `AskGuideTest` - a real askguide server on a random port pointed at it
//! - `WsClient` - event stream client

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use askguide::config::ApiToken;
use askguide::{Config, Server};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Minimal PNG signature plus IHDR length, enough for format sniffing
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

/// Token the harness configures and the fake endpoint expects
pub const TEST_TOKEN: &str = "hf_test_token";

/// What the fake endpoint answers with
#[derive(Debug, Clone)]
pub struct FakeReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl FakeReply {
    pub fn image(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request the fake endpoint received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct FakeState {
    reply: Arc<Mutex<FakeReply>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Scripted inference endpoint on a random local port
pub struct FakeInference {
    pub addr: SocketAddr,
    state: FakeState,
    _handle: JoinHandle<()>,
}

impl FakeInference {
    pub async fn start(reply: FakeReply) -> Result<Self> {
        let state = FakeState {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/models/{*model}", post(infer))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Fake inference error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Change the reply for subsequent requests
    pub fn set_reply(&self, reply: FakeReply) {
        *self.state.reply.lock() = reply;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

async fn infer(
    State(state): State<FakeState>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().push(RecordedRequest {
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = state.reply.lock().clone();
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    (
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
}

/// Test harness that runs a real askguide server on a random port
pub struct AskGuideTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub fake: FakeInference,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl AskGuideTest {
    /// Start a server whose endpoint answers with `reply`
    pub async fn start(reply: FakeReply) -> Result<Self> {
        Self::start_with(reply, |_| {}).await
    }

    /// Start a server, adjusting the config before launch
    pub async fn start_with(reply: FakeReply, adjust: impl FnOnce(&mut Config)) -> Result<Self> {
        let fake = FakeInference::start(reply).await?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let mut config = Config {
            bind_addr: addr,
            db_path: None,
            endpoint_url: fake.base_url(),
            model: "test/model".to_string(),
            api_token: Some(ApiToken::new(TEST_TOKEN)),
            request_timeout_secs: 5,
            wait_for_model: false,
        };
        adjust(&mut config);

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            fake,
            server,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a POST request without a body
    pub async fn post_empty(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Submit a prompt over HTTP
    pub async fn submit(&self, text: &str) -> Result<reqwest::Response> {
        self.post("/conversation", &serde_json::json!({ "text": text }))
            .await
    }

    /// Fetch the conversation listing
    pub async fn conversation(&self) -> Result<serde_json::Value> {
        Ok(self.get("/conversation").await?.json().await?)
    }

    /// Poll until no generation is in flight, returning the final listing
    pub async fn wait_idle(&self) -> Result<serde_json::Value> {
        for _ in 0..100 {
            let conversation = self.conversation().await?;
            if conversation["input_enabled"] == true {
                return Ok(conversation);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("generation still in flight after 5 seconds")
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connect_ws(&self) -> Result<WsClient> {
        let (ws_stream, _) = connect_async(&self.ws_url()).await?;
        let (write, read) = ws_stream.split();
        Ok(WsClient { write, read })
    }
}

impl Drop for AskGuideTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// WebSocket client for testing
pub struct WsClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

impl WsClient {
    /// Send a JSON message
    pub async fn send_json(&mut self, msg: serde_json::Value) -> Result<()> {
        self.write
            .send(Message::Text(msg.to_string().into()))
            .await?;
        Ok(())
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<serde_json::Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    anyhow::bail!("WebSocket closed");
                }
                _ => continue,
            }
        }
    }

    /// Receive with timeout
    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<serde_json::Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Receive messages until one has the given `type`
    pub async fn expect(&mut self, kind: &str) -> Result<serde_json::Value> {
        loop {
            let msg = self.recv_json_timeout(Duration::from_secs(5)).await?;
            if msg["type"] == kind {
                return Ok(msg);
            }
        }
    }
}
