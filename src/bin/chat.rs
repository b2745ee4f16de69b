//! askguide_chat - terminal chat front end
//!
//! Reads prompts line by line, shows each entry as it is appended, and
//! writes generated images into the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use askguide::config::Config;
use askguide::conversation::{ConversationController, ConversationEntry};
use askguide::db::Database;
use askguide::flags::{FlagStore, Onboarding, ONBOARDING_MESSAGE, ONBOARDING_TITLE};
use askguide::inference::InferenceClient;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// AskGuide terminal chat
#[derive(Parser, Debug)]
#[command(
    name = "askguide_chat",
    version,
    about = "Transform your words into visuals from the terminal"
)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite file remembering whether the welcome notice was shown
    /// (default: askguide.db)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Directory generated images are written to
    #[arg(short, long, default_value = "askguide-images")]
    out: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

const HELP: &str = "Type a prompt and press Enter. Ctrl-C cancels a pending image, \
or quits when nothing is pending. Commands: /help, /list, /quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    askguide::init_tracing("askguide=warn", args.log_json);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = &args.database {
        config.db_path = Some(database.to_string_lossy().into_owned());
    }
    let db = Database::new(config.db_path.as_deref()).await?;
    let onboarding = Onboarding::new(FlagStore::new(db.pool().clone()));

    let client = InferenceClient::new(&config)?;
    let controller = ConversationController::new(Arc::new(client));
    if !controller.is_configured() {
        eprintln!("warning: ASKGUIDE_API_TOKEN is not set; no images will be generated");
    }

    tokio::fs::create_dir_all(&args.out).await?;

    println!("AskGuide - Transform Your Words into Visuals");
    if onboarding.needs_notice().await? {
        println!("\n{}\n{}\n", ONBOARDING_TITLE, ONBOARDING_MESSAGE);
        onboarding.acknowledge().await?;
    }
    println!("{}", HELP);

    // One SIGINT listener for the whole session
    let quit = CancellationToken::new();
    {
        let controller = controller.clone();
        let quit = quit.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !interrupt(&controller, &quit) {
                    break;
                }
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = quit.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/list" => {
                for entry in controller.entries() {
                    print_entry(&entry);
                }
            }
            _ => submit(&controller, &line, &args.out).await?,
        }
    }

    controller.shutdown();

    if quit.is_cancelled() {
        // The stdin reader thread is still blocked and would hold up runtime shutdown
        println!();
        std::process::exit(0);
    }
    Ok(())
}

/// Ctrl-C cancels the pending generation, or asks the chat to quit.
///
/// Returns false once quitting.
fn interrupt(controller: &ConversationController, quit: &CancellationToken) -> bool {
    if controller.cancel_pending() {
        println!("cancelling...");
        true
    } else {
        quit.cancel();
        false
    }
}

fn print_entry(entry: &ConversationEntry) {
    let marker = if entry.image.is_some() { "[image]" } else { "" };
    println!("#{} {}  {} {}", entry.id, entry.display_time(), entry.text, marker);
}

/// Submit one prompt and wait for its image
async fn submit(controller: &ConversationController, prompt: &str, out: &Path) -> Result<()> {
    let pending = match controller.begin(prompt) {
        Ok(pending) => pending,
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };

    print_entry(pending.entry());
    println!("generating...");

    let outcome = pending.run().await;
    let id = outcome.id();

    match controller.entry(id).and_then(|entry| entry.image) {
        Some(image) if outcome.is_generated() => {
            let path = out.join(format!("{}.{}", id, image.extension()));
            tokio::fs::write(&path, image.bytes()).await?;
            println!("image saved to {}", path.display());
        }
        _ => println!("#{} (no image)", id),
    }

    Ok(())
}
