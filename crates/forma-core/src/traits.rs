use crate::{
    context::Context,
    error::FormaError,
    event::{InboundEvent, OutgoingMessage},
    intent::EditAction,
    state::FunnelState,
};
use async_trait::async_trait;
use std::sync::Arc;

/// AI Provider trait — the brain.
///
/// Every LLM backend (Anthropic, OpenAI, Gemini) implements this trait to
/// provide a uniform interface for classification and response generation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, FormaError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Where inbound events land. Implemented by the gateway; handed to each
/// channel so identity-resolution failures surface at the ingress boundary
/// (an unresolvable alias-only event is rejected, not silently dropped).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn accept(&self, event: InboundEvent) -> Result<(), FormaError>;
}

/// Messaging Channel trait — the nervous system.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start receiving. Every inbound event is offered to `sink`.
    async fn start(&self, sink: Arc<dyn EventSink>) -> Result<(), FormaError>;

    /// Send a text response to a user by durable id.
    async fn send(&self, durable_id: &str, text: &str) -> Result<(), FormaError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), FormaError>;
}

/// Speech-to-text collaborator: raw audio bytes + mime type in, text out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, FormaError>;
}

/// Visual-description collaborator: raw media bytes + mime type + an
/// instruction in, text description out.
#[async_trait]
pub trait MediaDescriber: Send + Sync {
    async fn describe(
        &self,
        media: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, FormaError>;
}

/// External training-program management collaborator.
#[async_trait]
pub trait ProgramService: Send + Sync {
    /// Apply one edit to a client's program. All fields are validated by
    /// the dispatcher before this is called.
    async fn apply_edit(
        &self,
        client_id: &str,
        action: EditAction,
        exercise: &str,
        category: &str,
    ) -> Result<(), FormaError>;
}

/// One funnel step's outcome.
#[derive(Debug, Clone)]
pub struct FunnelReply {
    /// Text to send to the lead.
    pub text: String,
    /// Funnel state after this step.
    pub next: FunnelState,
}

/// Scripted sales-funnel collaborator. Owns the step wording and
/// progression; the dispatcher owns when it runs.
#[async_trait]
pub trait FunnelScript: Send + Sync {
    async fn step_reply(
        &self,
        scenario: &str,
        state: FunnelState,
        turn_text: &str,
    ) -> Result<FunnelReply, FormaError>;
}
