//! Conversation controller
//!
//! Owns the session's entry list and runs one generation at a time:
//!
//! 1. `begin` validates the prompt, claims the in-flight slot (input
//!    disabled) and appends an image-less entry so the prompt shows up
//!    right away.
//! 2. `PendingSubmission::run` issues the request and attaches the image
//!    on success. Failures are logged and leave the entry without an image.
//! 3. Dropping the pending submission, run or not, frees the slot and
//!    re-enables input.
//!
//! Every state change is also published as a `ConversationEvent`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::entry::{AttachError, Conversation, ConversationEntry};
use crate::inference::{GenerationError, ImageGenerator};

/// Event channel depth per subscriber
const EVENT_CAPACITY: usize = 64;

/// Why a prompt was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Shown to the user verbatim
    #[error("Enter the Text First")]
    EmptyPrompt,

    #[error("an image is already being generated")]
    Busy,
}

/// How a submission ended
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Image attached to entry `id`
    Generated { id: u64 },
    /// No image; the entry stays image-less
    Failed { id: u64, error: GenerationError },
    /// Image produced but the entry refused it
    Unattached { id: u64, error: AttachError },
}

impl SubmissionOutcome {
    pub fn id(&self) -> u64 {
        match self {
            SubmissionOutcome::Generated { id }
            | SubmissionOutcome::Failed { id, .. }
            | SubmissionOutcome::Unattached { id, .. } => *id,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SubmissionOutcome::Generated { .. })
    }
}

/// Conversation state changes, in the order they happen
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A prompt was accepted; its entry has no image yet
    EntryAppended { entry: ConversationEntry },
    /// Entry `id` received its image (surfaces fade it in)
    ImageAttached { id: u64, mime_type: String },
    /// Entry `id` will never receive an image
    GenerationFailed { id: u64, reason: String },
    /// Input accepted or blocked
    InputEnabled { enabled: bool },
}

struct Shared {
    conversation: RwLock<Conversation>,
    in_flight: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
    session: CancellationToken,
    events: broadcast::Sender<ConversationEvent>,
}

impl Shared {
    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Holds the single in-flight slot; frees it on drop
struct FlightSlot {
    shared: Arc<Shared>,
}

impl Drop for FlightSlot {
    fn drop(&mut self) {
        self.shared.current.lock().take();
        self.shared.in_flight.store(false, Ordering::Release);
        self.shared
            .emit(ConversationEvent::InputEnabled { enabled: true });
    }
}

/// Single-session prompt → image controller
#[derive(Clone)]
pub struct ConversationController {
    generator: Arc<dyn ImageGenerator>,
    shared: Arc<Shared>,
}

impl ConversationController {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            generator,
            shared: Arc::new(Shared {
                conversation: RwLock::new(Conversation::new()),
                in_flight: AtomicBool::new(false),
                current: Mutex::new(None),
                session: CancellationToken::new(),
                events,
            }),
        }
    }

    /// Accept a prompt and append its entry.
    ///
    /// Blank prompts and prompts arriving while another generation is in
    /// flight are rejected without touching the list.
    pub fn begin(&self, prompt: &str) -> Result<PendingSubmission, SubmitError> {
        if prompt.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }

        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejecting prompt while a generation is in flight");
            return Err(SubmitError::Busy);
        }

        self.shared
            .emit(ConversationEvent::InputEnabled { enabled: false });
        let slot = FlightSlot {
            shared: self.shared.clone(),
        };

        let cancel = self.shared.session.child_token();
        *self.shared.current.lock() = Some(cancel.clone());

        let entry = self
            .shared
            .conversation
            .write()
            .append(prompt.to_string(), chrono::Utc::now().timestamp_millis())
            .clone();

        info!("Accepted prompt as entry {}", entry.id);
        self.shared.emit(ConversationEvent::EntryAppended {
            entry: entry.clone(),
        });

        Ok(PendingSubmission {
            entry,
            generator: self.generator.clone(),
            shared: self.shared.clone(),
            cancel,
            _slot: slot,
        })
    }

    /// `begin` followed by `run`
    pub async fn submit(&self, prompt: &str) -> Result<SubmissionOutcome, SubmitError> {
        Ok(self.begin(prompt)?.run().await)
    }

    /// False while a generation is in flight
    pub fn is_input_enabled(&self) -> bool {
        !self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Whether the generator can be used at all
    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// Snapshot of all entries in submission order
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.shared.conversation.read().entries().to_vec()
    }

    /// Snapshot of one entry
    pub fn entry(&self, id: u64) -> Option<ConversationEntry> {
        self.shared.conversation.read().get(id).cloned()
    }

    /// Receive future conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.shared.events.subscribe()
    }

    /// Cancel the in-flight generation; false when nothing was pending
    pub fn cancel_pending(&self) -> bool {
        match self.shared.current.lock().as_ref() {
            Some(token) => {
                info!("Cancelling in-flight generation");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel any in-flight generation and refuse to start new requests
    pub fn shutdown(&self) {
        self.shared.session.cancel();
    }
}

/// An accepted prompt whose image has not been requested yet
pub struct PendingSubmission {
    entry: ConversationEntry,
    generator: Arc<dyn ImageGenerator>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _slot: FlightSlot,
}

impl std::fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl PendingSubmission {
    /// The entry as appended (no image)
    pub fn entry(&self) -> &ConversationEntry {
        &self.entry
    }

    /// Request the image and attach it. Input is re-enabled on return.
    pub async fn run(self) -> SubmissionOutcome {
        let id = self.entry.id;

        match self.generator.generate(&self.entry.text, &self.cancel).await {
            Ok(image) => {
                let mime_type = image.mime_type().to_string();
                let attached = self.shared.conversation.write().attach_image(id, image);

                match attached {
                    Ok(()) => {
                        info!("Attached {} image to entry {}", mime_type, id);
                        self.shared
                            .emit(ConversationEvent::ImageAttached { id, mime_type });
                        SubmissionOutcome::Generated { id }
                    }
                    Err(error) => {
                        error!("Could not attach image to entry {}: {}", id, error);
                        self.shared.emit(ConversationEvent::GenerationFailed {
                            id,
                            reason: error.to_string(),
                        });
                        SubmissionOutcome::Unattached { id, error }
                    }
                }
            }
            Err(error) => {
                warn!("Image generation failed for entry {}: {}", id, error);
                self.shared.emit(ConversationEvent::GenerationFailed {
                    id,
                    reason: error.to_string(),
                });
                SubmissionOutcome::Failed { id, error }
            }
        }
    }
}
