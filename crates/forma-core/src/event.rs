use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inbound event delivered by the messaging-platform webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: Uuid,
    /// Platform-assigned stable identifier for the sender.
    pub durable_id: String,
    /// Secondary, possibly-unstable alias (username). May arrive as an
    /// opaque placeholder before the platform resolves it.
    pub alias: Option<String>,
    /// Message text content. Empty for pure media messages.
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    /// Whether the event carries any content worth processing.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

/// A file attachment on an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: Option<String>,
    pub data: Option<Vec<u8>>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

/// Supported attachment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    Document,
    Other,
}

/// One coalesced batch of events for a single sender, produced by the
/// conversation buffer and consumed by the pipeline. Not persisted.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    /// Canonical durable id the batch was buffered under.
    pub durable_id: String,
    /// Best alias observed across the batch.
    pub alias: Option<String>,
    /// All event texts, arrival order, newline-joined.
    pub composed_text: String,
    pub attachments: Vec<Attachment>,
    pub batch_start: DateTime<Utc>,
}

/// A generated response on its way out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: ResponseMetadata,
}

/// Metadata about how a response was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}
