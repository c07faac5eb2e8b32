//! Conversation buffer — per-sender debounce of inbound events.
//!
//! A user typing one thought across several quick bubbles gets one
//! coalesced turn, not several AI replies. Pure debounce: every new event
//! restarts the window. Queued events die with the process; this is a
//! best-effort buffer, not a durable queue.

use super::Gateway;
use chrono::{DateTime, Utc};
use forma_core::event::{ConversationTurn, InboundEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Events accumulated for one sender during the debounce window.
pub(crate) struct TurnBuffer {
    events: Vec<InboundEvent>,
    /// Bumped on every arrival; a flush task only fires if its generation
    /// is still current. This is the timer restart.
    generation: u64,
    batch_start: DateTime<Utc>,
}

impl Gateway {
    /// Enqueue an event and (re)start the sender's debounce timer.
    pub(super) async fn buffer_event(self: &Arc<Self>, key: String, event: InboundEvent) {
        let generation = {
            let mut buffers = self.buffers.lock().await;
            let buffer = buffers.entry(key.clone()).or_insert_with(|| TurnBuffer {
                events: Vec::new(),
                generation: 0,
                batch_start: event.timestamp,
            });
            buffer.events.push(event);
            buffer.generation += 1;
            buffer.generation
        };

        debug!("buffered event for {key} (generation {generation})");

        let gateway = self.clone();
        tokio::spawn(async move {
            gateway.flush_after_quiet(key, generation).await;
        });
    }

    /// Wait out the debounce window; flush only if no newer event arrived.
    async fn flush_after_quiet(self: Arc<Self>, key: String, generation: u64) {
        tokio::time::sleep(Duration::from_secs(self.buffer_config.debounce_secs)).await;

        let turn = {
            let mut buffers = self.buffers.lock().await;
            if buffers
                .get(&key)
                .is_some_and(|b| b.generation == generation)
            {
                buffers.remove(&key).map(|b| compose_turn(&key, b))
            } else {
                // A newer event restarted the window; that arrival owns
                // the flush now.
                None
            }
        };

        let Some(turn) = turn else { return };

        // Strict in-order, one-at-a-time processing per identity.
        let lock = self.turn_lock(&key).await;
        let _guard = lock.lock().await;
        self.process_turn(turn).await;
    }
}

/// Join the queued events into one turn: texts in arrival order,
/// newline-separated, attachments concatenated.
fn compose_turn(key: &str, buffer: TurnBuffer) -> ConversationTurn {
    let mut texts = Vec::new();
    let mut attachments = Vec::new();
    let mut alias = None;

    for event in buffer.events {
        if !event.text.trim().is_empty() {
            texts.push(event.text);
        }
        attachments.extend(event.attachments);
        if event.alias.is_some() {
            alias = event.alias;
        }
    }

    ConversationTurn {
        durable_id: key.to_string(),
        alias,
        composed_text: texts.join("\n"),
        attachments,
        batch_start: buffer.batch_start,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use forma_core::event::InboundEvent;
    use forma_memory::Direction;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn event_at(durable_id: &str, text: &str, offset_secs: i64) -> InboundEvent {
        InboundEvent {
            id: Uuid::new_v4(),
            durable_id: durable_id.to_string(),
            alias: None,
            text: text.to_string(),
            attachments: Vec::new(),
            timestamp: Utc::now() + ChronoDuration::seconds(offset_secs),
        }
    }

    async fn inbound_history(
        gateway: &Arc<super::Gateway>,
        id: &str,
    ) -> Vec<forma_memory::StoredMessage> {
        gateway
            .store
            .history(id, 20)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.direction == Direction::Inbound)
            .collect()
    }

    #[tokio::test]
    async fn test_rapid_events_coalesce_into_one_turn() {
        let chat = MockProvider::new("chat", Behavior::Succeed("sure!".into()));
        let classifier = MockProvider::new("classifier", Behavior::Succeed(chat_json()));
        let channel = Arc::new(RecordingChannel::default());
        let gateway = test_gateway(
            vec![classifier.clone()],
            chat,
            Arc::new(MockProgram::default()),
            channel.clone(),
        )
        .await;

        // Three bubbles, 2s apart — all inside one 15s window.
        gateway
            .buffer_event("u1".into(), event_at("u1", "hey", 0))
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        gateway
            .buffer_event("u1".into(), event_at("u1", "I wanted to ask", 2))
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        gateway
            .buffer_event("u1".into(), event_at("u1", "about my diet", 4))
            .await;

        let g = gateway.clone();
        eventually(move || {
            let g = g.clone();
            async move { !inbound_history(&g, "u1").await.is_empty() }
        })
        .await;

        let inbound = inbound_history(&gateway, "u1").await;
        assert_eq!(inbound.len(), 1, "three bubbles must land as one turn");
        assert_eq!(inbound[0].content, "hey\nI wanted to ask\nabout my diet");

        // Exactly one reply went out.
        let ch = channel.clone();
        eventually(move || {
            let ch = ch.clone();
            async move { !ch.sent.lock().await.is_empty() }
        })
        .await;
        assert_eq!(channel.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_gap_beyond_window_splits_turns() {
        let chat = MockProvider::new("chat", Behavior::Succeed("hi!".into()));
        let classifier = MockProvider::new("classifier", Behavior::Succeed(chat_json()));
        let channel = Arc::new(RecordingChannel::default());
        let gateway = test_gateway(
            vec![classifier.clone()],
            chat,
            Arc::new(MockProgram::default()),
            channel.clone(),
        )
        .await;

        gateway
            .buffer_event("u1".into(), event_at("u1", "first thought", 0))
            .await;
        let g = gateway.clone();
        eventually(move || {
            let g = g.clone();
            async move { inbound_history(&g, "u1").await.len() == 1 }
        })
        .await;

        gateway
            .buffer_event("u1".into(), event_at("u1", "second thought", 600))
            .await;
        let g = gateway.clone();
        eventually(move || {
            let g = g.clone();
            async move { inbound_history(&g, "u1").await.len() == 2 }
        })
        .await;

        let inbound = inbound_history(&gateway, "u1").await;
        assert_eq!(inbound[0].content, "first thought");
        assert_eq!(inbound[1].content, "second thought");
    }

    #[tokio::test]
    async fn test_new_event_restarts_window() {
        let chat = MockProvider::new("chat", Behavior::Succeed("hi!".into()));
        let classifier = MockProvider::new("classifier", Behavior::Succeed(chat_json()));
        let channel = Arc::new(RecordingChannel::default());
        let gateway = test_gateway(
            vec![classifier.clone()],
            chat,
            Arc::new(MockProgram::default()),
            channel.clone(),
        )
        .await;

        // Second bubble lands at 14s — inside the window — so the batch
        // may only flush at 14s + 15s, not at the original 15s deadline.
        let started = tokio::time::Instant::now();
        gateway
            .buffer_event("u1".into(), event_at("u1", "one", 0))
            .await;
        tokio::time::sleep(Duration::from_secs(14)).await;
        gateway
            .buffer_event("u1".into(), event_at("u1", "two", 14))
            .await;

        let g = gateway.clone();
        eventually(move || {
            let g = g.clone();
            async move { !inbound_history(&g, "u1").await.is_empty() }
        })
        .await;

        // The flush could not have come from the first, canceled timer.
        assert!(started.elapsed() >= Duration::from_secs(28));
        let inbound = inbound_history(&gateway, "u1").await;
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].content, "one\ntwo");
    }

    #[tokio::test]
    async fn test_different_senders_do_not_share_buffers() {
        let chat = MockProvider::new("chat", Behavior::Succeed("hi!".into()));
        let classifier = MockProvider::new("classifier", Behavior::Succeed(chat_json()));
        let channel = Arc::new(RecordingChannel::default());
        let gateway = test_gateway(
            vec![classifier.clone()],
            chat,
            Arc::new(MockProgram::default()),
            channel.clone(),
        )
        .await;

        gateway
            .buffer_event("u1".into(), event_at("u1", "from u1", 0))
            .await;
        gateway
            .buffer_event("u2".into(), event_at("u2", "from u2", 0))
            .await;

        let g = gateway.clone();
        eventually(move || {
            let g = g.clone();
            async move {
                inbound_history(&g, "u1").await.len() == 1
                    && inbound_history(&g, "u2").await.len() == 1
            }
        })
        .await;
    }
}
