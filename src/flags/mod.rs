//! Local key-value flags
//!
//! A tiny string store for client-side state that outlives the session.
//! The only user is the one-time onboarding notice.

use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tracing::debug;

/// Key recording that the onboarding notice was acknowledged
pub const ONBOARDING_KEY: &str = "id";

/// Value written once onboarding is acknowledged
pub const ONBOARDING_DONE: &str = "done";

/// Onboarding notice title
pub const ONBOARDING_TITLE: &str = "Welcome to AskGuide";

/// Onboarding notice body
pub const ONBOARDING_MESSAGE: &str = "Type a prompt to turn your words into visuals.";

/// Flag store errors
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// SQLite-backed string flags
#[derive(Clone)]
pub struct FlagStore {
    pool: SqlitePool,
}

impl FlagStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read a flag; `None` when it was never set
    pub async fn get(&self, key: &str) -> Result<Option<String>, FlagError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM flags WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Write a flag, replacing any previous value
    pub async fn set(&self, key: &str, value: &str) -> Result<(), FlagError> {
        sqlx::query(
            "INSERT INTO flags (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!("Set flag {}", key);
        Ok(())
    }
}

/// One-time onboarding notice state
#[derive(Clone)]
pub struct Onboarding {
    flags: FlagStore,
}

impl Onboarding {
    pub fn new(flags: FlagStore) -> Self {
        Self { flags }
    }

    /// True until the notice has been acknowledged once
    pub async fn needs_notice(&self) -> Result<bool, FlagError> {
        Ok(self.flags.get(ONBOARDING_KEY).await?.is_none())
    }

    /// Record that the notice was seen
    pub async fn acknowledge(&self) -> Result<(), FlagError> {
        self.flags.set(ONBOARDING_KEY, ONBOARDING_DONE).await
    }
}
