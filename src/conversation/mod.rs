//! Conversation module
//!
//! Provides:
//! - `ConversationEntry` and the append-only `Conversation` list
//! - `ConversationController`, the single-flight prompt → image flow
//! - `ConversationEvent`, the change stream surfaces render from

mod controller;
mod entry;

pub use controller::{
    ConversationController, ConversationEvent, PendingSubmission, SubmissionOutcome, SubmitError,
};
pub use entry::{format_timestamp, AttachError, Conversation, ConversationEntry, TIMESTAMP_FORMAT};
