//! Conversation entries and the ordered session list

use serde::Serialize;
use thiserror::Error;

use crate::images::ImageRef;

/// Display format for entry timestamps (always UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One prompt and, once generated, its image
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    /// 1-based position in the session
    pub id: u64,
    /// Prompt exactly as submitted
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Set at most once, on a successful generation
    pub image: Option<ImageRef>,
}

impl ConversationEntry {
    /// Timestamp rendered with [`format_timestamp`]
    pub fn display_time(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_timestamp(millis: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => "invalid timestamp".to_string(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("no entry with id {0}")]
    UnknownEntry(u64),

    #[error("entry {0} already has an image")]
    AlreadyAttached(u64),
}

/// Append-only list of entries for one session
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new image-less entry.
    ///
    /// The id is `len + 1`; the timestamp never goes backwards relative to
    /// the previous entry even if the wall clock does.
    pub fn append(&mut self, text: String, now_millis: i64) -> &ConversationEntry {
        let timestamp = self
            .entries
            .last()
            .map_or(now_millis, |last| last.timestamp.max(now_millis));

        self.entries.push(ConversationEntry {
            id: self.entries.len() as u64 + 1,
            text,
            timestamp,
            image: None,
        });

        &self.entries[self.entries.len() - 1]
    }

    /// Attach a generated image to entry `id`
    pub fn attach_image(&mut self, id: u64, image: ImageRef) -> Result<(), AttachError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AttachError::UnknownEntry(id))?;

        if entry.image.is_some() {
            return Err(AttachError::AlreadyAttached(id));
        }

        entry.image = Some(image);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&ConversationEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
