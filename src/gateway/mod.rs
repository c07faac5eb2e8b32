//! Gateway — the conversation orchestration engine.
//!
//! Inbound events are debounced per sender into coalesced turns, media is
//! folded into text, history is appended and deduplicated, intent is
//! classified over the model cascade, and the dispatcher's state machine
//! picks the response pipeline.

mod buffer;
mod classify;
mod compose;
mod dispatch;
mod pipeline;

pub use classify::Classifier;

use async_trait::async_trait;
use buffer::TurnBuffer;
use forma_core::{
    config::{BufferConfig, FunnelConfig, Prompts},
    error::FormaError,
    event::InboundEvent,
    state::PendingState,
    traits::{Channel, EventSink, FunnelScript, ProgramService, Provider},
};
use forma_media::MediaResolver;
use forma_memory::{
    audit::{AuditEntry, AuditLogger, AuditStatus},
    Store,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The central gateway wiring channels, memory, media, and providers.
pub struct Gateway {
    pub(super) channels: HashMap<String, Arc<dyn Channel>>,
    pub(super) store: Store,
    pub(super) audit: AuditLogger,
    pub(super) resolver: MediaResolver,
    pub(super) classifier: Classifier,
    /// Provider for composed responses (analysis, general chat).
    pub(super) chat_provider: Arc<dyn Provider>,
    pub(super) program: Arc<dyn ProgramService>,
    pub(super) funnel: Arc<dyn FunnelScript>,
    pub(super) prompts: Prompts,
    pub(super) buffer_config: BufferConfig,
    pub(super) funnel_config: FunnelConfig,
    /// Per-sender debounce buffers.
    pub(super) buffers: Mutex<HashMap<String, TurnBuffer>>,
    /// Per-identity processing locks: turns for one identity run strictly
    /// in flush order, one at a time.
    pub(super) turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Per-identity pending flow state.
    pub(super) pending: Mutex<HashMap<String, PendingState>>,
}

impl Gateway {
    /// Create a new gateway.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: HashMap<String, Arc<dyn Channel>>,
        store: Store,
        resolver: MediaResolver,
        classifier: Classifier,
        chat_provider: Arc<dyn Provider>,
        program: Arc<dyn ProgramService>,
        funnel: Arc<dyn FunnelScript>,
        prompts: Prompts,
        buffer_config: BufferConfig,
        funnel_config: FunnelConfig,
    ) -> Self {
        let audit = AuditLogger::new(store.pool().clone());
        Self {
            channels,
            store,
            audit,
            resolver,
            classifier,
            chat_provider,
            program,
            funnel,
            prompts,
            buffer_config,
            funnel_config,
            buffers: Mutex::new(HashMap::new()),
            turn_locks: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Run until shutdown.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "forma gateway running | chat provider: {} | channels: {} | debounce: {}s",
            self.chat_provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
            self.buffer_config.debounce_secs,
        );

        let sink: Arc<dyn EventSink> = Arc::new(GatewaySink(self.clone()));
        for (name, channel) in &self.channels {
            channel
                .start(sink.clone())
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            info!("channel started: {name}");
        }

        tokio::signal::ctrl_c().await?;
        info!("received shutdown signal");

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("shutdown complete");
        Ok(())
    }

    /// The per-identity processing lock, created on first use.
    pub(super) async fn turn_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Snapshot of an identity's pending state.
    pub(super) async fn pending_state(&self, identity_id: &str) -> PendingState {
        self.pending
            .lock()
            .await
            .get(identity_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Store an identity's pending state; idle states are dropped from the
    /// map to keep it bounded.
    pub(super) async fn set_pending(&self, identity_id: &str, state: PendingState) {
        let mut pending = self.pending.lock().await;
        if state.is_idle() {
            pending.remove(identity_id);
        } else {
            pending.insert(identity_id.to_string(), state);
        }
    }

    /// Send a text to a user, tolerating failure: a lost send never aborts
    /// the turn.
    pub(super) async fn send_text(&self, durable_id: &str, text: &str) {
        for (name, channel) in &self.channels {
            match channel.send(durable_id, text).await {
                Ok(()) => return,
                Err(e) => warn!("send via {name} failed: {e}"),
            }
        }
        error!("no channel delivered message to {durable_id}");
    }
}

/// Newtype adapter so the foreign `EventSink` trait can be implemented
/// without violating the orphan rule (`Arc` is neither local nor a
/// fundamental type). Forwards directly to the wrapped gateway.
struct GatewaySink(Arc<Gateway>);

#[async_trait]
impl EventSink for GatewaySink {
    /// Intake from a channel. Resolves the canonical buffer key, rejecting
    /// alias-only events that match no known identity — that failure
    /// belongs to the ingress boundary, not a background task.
    async fn accept(&self, event: InboundEvent) -> Result<(), FormaError> {
        let this = &self.0;
        let key = if !event.durable_id.is_empty() {
            event.durable_id.clone()
        } else {
            match this
                .store
                .resolve_identity(None, event.alias.as_deref())
                .await
            {
                Ok(identity) => identity.id,
                Err(e) => {
                    let _ = this
                        .audit
                        .log(&AuditEntry {
                            identity_id: event.alias.clone().unwrap_or_default(),
                            input_text: event.text.clone(),
                            output_text: None,
                            provider_used: None,
                            model: None,
                            processing_ms: None,
                            status: AuditStatus::Rejected,
                            error: Some(e.to_string()),
                        })
                        .await;
                    return Err(e);
                }
            }
        };

        this.buffer_event(key, event).await;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use forma_core::{
        config::{ClassifierConfig, MediaConfig, MemoryConfig},
        context::Context,
        event::{OutgoingMessage, ResponseMetadata},
        intent::EditAction,
        traits::{MediaDescriber, SpeechToText},
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted provider behavior for cascade tests.
    pub enum Behavior {
        Succeed(String),
        AlwaysRateLimited,
        AlwaysFail,
    }

    pub struct MockProvider {
        pub name: &'static str,
        pub behavior: Behavior,
        pub calls: AtomicU32,
    }

    impl MockProvider {
        pub fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicU32::new(0),
            })
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _context: &Context) -> Result<OutgoingMessage, FormaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed(text) => Ok(OutgoingMessage {
                    text: text.clone(),
                    metadata: ResponseMetadata {
                        provider_used: self.name.to_string(),
                        ..Default::default()
                    },
                }),
                Behavior::AlwaysRateLimited => {
                    Err(FormaError::RateLimited("quota exceeded".to_string()))
                }
                Behavior::AlwaysFail => Err(FormaError::Provider("boom".to_string())),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    pub struct MockStt;

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn transcribe(&self, _audio: &[u8], _mime: &str) -> Result<String, FormaError> {
            Ok("mock transcript".to_string())
        }
    }

    pub struct MockDescriber;

    #[async_trait]
    impl MediaDescriber for MockDescriber {
        async fn describe(
            &self,
            _media: &[u8],
            _mime: &str,
            _instruction: &str,
        ) -> Result<String, FormaError> {
            Ok("mock description".to_string())
        }
    }

    /// Records edits; fails any edit whose exercise contains "fail".
    #[derive(Default)]
    pub struct MockProgram {
        pub edits: Mutex<Vec<(String, String, String, String)>>,
    }

    #[async_trait]
    impl ProgramService for MockProgram {
        async fn apply_edit(
            &self,
            client_id: &str,
            action: EditAction,
            exercise: &str,
            category: &str,
        ) -> Result<(), FormaError> {
            if exercise.contains("fail") {
                return Err(FormaError::ExternalAction("service rejected edit".into()));
            }
            self.edits.lock().await.push((
                client_id.to_string(),
                action.as_str().to_string(),
                exercise.to_string(),
                category.to_string(),
            ));
            Ok(())
        }
    }

    /// A channel that records what it sends and delivers nothing.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self, _sink: Arc<dyn EventSink>) -> Result<(), FormaError> {
            Ok(())
        }

        async fn send(&self, durable_id: &str, text: &str) -> Result<(), FormaError> {
            self.sent
                .lock()
                .await
                .push((durable_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn stop(&self) -> Result<(), FormaError> {
            Ok(())
        }
    }

    /// Build a gateway over in-memory storage and the given mocks.
    pub async fn test_gateway(
        cascade: Vec<Arc<dyn Provider>>,
        chat_provider: Arc<dyn Provider>,
        program: Arc<MockProgram>,
        channel: Arc<RecordingChannel>,
    ) -> Arc<Gateway> {
        let store = Store::new(&MemoryConfig {
            db_path: ":memory:".to_string(),
            max_context_messages: 20,
            dedup_window_secs: 300,
        })
        .await
        .expect("in-memory store");

        let classifier_config = ClassifierConfig {
            backoff_secs: 1,
            ..Default::default()
        };
        let classifier = Classifier::new(cascade, &classifier_config);

        let resolver = MediaResolver::new(
            Arc::new(MockStt),
            Arc::new(MockDescriber),
            MediaConfig::default(),
        );

        let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
        channels.insert("recording".to_string(), channel);

        Arc::new(Gateway::new(
            channels,
            store,
            resolver,
            classifier,
            chat_provider,
            program,
            Arc::new(crate::funnel::ScriptedFunnel),
            Prompts::default(),
            BufferConfig { debounce_secs: 15 },
            FunnelConfig::default(),
        ))
    }

    /// JSON the mock classifier returns for a plain chat turn.
    pub fn chat_json() -> String {
        r#"{"category":"general_chat","confidence":95}"#.to_string()
    }

    /// Poll an async condition until it holds. Under a paused clock the
    /// sleeps are instant, so this converges as soon as background tasks
    /// (flush, sqlite) settle.
    pub async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..500 {
            if check().await {
                return;
            }
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        panic!("condition not reached in time");
    }
}
