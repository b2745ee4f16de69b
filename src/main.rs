//! askguide - text-to-image chat daemon

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use askguide::{Config, Server};
use clap::Parser;
use tracing::info;

/// AskGuide chat daemon
#[derive(Parser, Debug)]
#[command(name = "askguide", version, about = "Serve the AskGuide text-to-image chat API")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// SQLite database file for local flags (default: askguide.db)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    askguide::init_tracing("askguide=info,tower_http=debug", args.log_json);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.db_path = Some(database.to_string_lossy().into_owned());
    }

    let server = Arc::new(Server::new(config).await?);
    info!("Starting askguide on {}", server.bind_addr());

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await
}
