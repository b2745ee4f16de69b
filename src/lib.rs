//! askguide - text-to-image chat
//!
//! Sends chat prompts to a hosted text-to-image model and shows the
//! returned images inline in the conversation.

pub mod api;
pub mod config;
pub mod conversation;
pub mod db;
pub mod flags;
pub mod images;
pub mod inference;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
use conversation::ConversationController;
use db::Database;
use flags::{FlagStore, Onboarding};
use inference::{ImageGenerator, InferenceClient};

/// The askguide daemon
pub struct Server {
    config: Config,
    db: Arc<Database>,
    controller: ConversationController,
    onboarding: Onboarding,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(config.db_path.as_deref()).await?);

        let client = InferenceClient::new(&config)?;
        if client.is_configured() {
            info!("Generating images with {}", client.model_url());
        } else {
            warn!("No inference API token configured; prompts will produce no images");
        }

        let controller = ConversationController::new(Arc::new(client));
        let onboarding = Onboarding::new(FlagStore::new(db.pool().clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db,
            controller,
            onboarding,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Build the router
    fn router(&self) -> axum::Router {
        api::router(api::AppState {
            db: self.db.clone(),
            controller: self.controller.clone(),
            onboarding: self.onboarding.clone(),
        })
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("askguide listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("askguide shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        self.controller.shutdown();
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`; `json` switches to structured output.
pub fn init_tracing(default_filter: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
