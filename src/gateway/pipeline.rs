//! Turn processing — one coalesced batch through the full pipeline.
//!
//! sanitize → fold media into text → resolve identity → append history →
//! dispatch → store, audit, send. Failures local to one attachment never
//! abort the turn; failures that leave nothing to answer do, with a
//! generic apology.

use super::Gateway;
use chrono::Utc;
use forma_core::{event::ConversationTurn, sanitize};
use forma_media::{MediaResolver, ResolvedMedia};
use forma_memory::{
    audit::{AuditEntry, AuditStatus},
    Direction,
};
use std::time::Instant;
use tracing::{error, info, warn};

impl Gateway {
    /// Process one coalesced turn end to end.
    pub(super) async fn process_turn(&self, turn: ConversationTurn) {
        let started = Instant::now();

        let preview = if turn.composed_text.chars().count() > 60 {
            let truncated: String = turn.composed_text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            turn.composed_text.clone()
        };
        info!(
            "[{}] turn: {preview} (+{} attachments)",
            turn.durable_id,
            turn.attachments.len()
        );

        // --- 1. SANITIZE ---
        let sanitized = sanitize::sanitize(&turn.composed_text);
        if sanitized.was_modified {
            warn!(
                "sanitized input from {}: {:?}",
                turn.durable_id, sanitized.warnings
            );
        }

        // --- 2. FOLD MEDIA INTO TEXT ---
        let mut media: Vec<ResolvedMedia> = Vec::new();
        let mut media_lines: Vec<String> = Vec::new();
        for attachment in &turn.attachments {
            match self.resolver.resolve(attachment).await {
                Ok(resolved) => {
                    media_lines.push(resolved.text.clone());
                    media.push(resolved);
                }
                Err(e) => {
                    // One bad attachment must not block the turn.
                    warn!("[{}] attachment dropped: {e}", turn.durable_id);
                    media_lines.push(MediaResolver::placeholder(attachment.kind).to_string());
                }
            }
        }

        let mut full_text = sanitized.text.trim().to_string();
        for line in &media_lines {
            if !full_text.is_empty() {
                full_text.push('\n');
            }
            full_text.push_str(line);
        }

        if full_text.is_empty() {
            // Nothing classifiable survived; the turn is meaningless.
            warn!("[{}] turn reduced to nothing, apologizing", turn.durable_id);
            self.send_text(&turn.durable_id, &self.prompts.apology).await;
            return;
        }

        // --- 3. IDENTITY & HISTORY ---
        let identity = match self
            .store
            .resolve_identity(Some(&turn.durable_id), turn.alias.as_deref())
            .await
        {
            Ok(identity) => identity,
            Err(e) => {
                error!("[{}] identity resolution failed: {e}", turn.durable_id);
                self.send_text(&turn.durable_id, &self.prompts.apology).await;
                return;
            }
        };

        let history = match self
            .store
            .append_message(&identity.id, Direction::Inbound, &full_text, turn.batch_start)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                error!("[{}] history append failed: {e}", identity.id);
                self.send_text(&turn.durable_id, &self.prompts.apology).await;
                return;
            }
        };

        // --- 4. DISPATCH ---
        let reply = self
            .dispatch_turn(&identity, &full_text, &media, &history)
            .await;

        // --- 5. STORE, AUDIT, SEND ---
        if let Err(e) = self
            .store
            .append_message(&identity.id, Direction::Outbound, &reply, Utc::now())
            .await
        {
            error!("[{}] failed to store reply: {e}", identity.id);
        }

        let _ = self
            .audit
            .log(&AuditEntry {
                identity_id: identity.id.clone(),
                input_text: full_text.clone(),
                output_text: Some(reply.clone()),
                provider_used: Some(self.chat_provider.name().to_string()),
                model: None,
                processing_ms: Some(started.elapsed().as_millis() as i64),
                status: AuditStatus::Ok,
                error: None,
            })
            .await;

        self.send_text(&turn.durable_id, &reply).await;

        // --- 6. ONBOARDING TRIGGER ---
        // Completing one flow can synchronously originate another: the
        // trigger phrase is scanned in the generated response, not the
        // user's message.
        if let Some(question) = self.maybe_trigger_onboarding(&identity.id, &reply).await {
            if let Err(e) = self
                .store
                .append_message(&identity.id, Direction::Outbound, &question, Utc::now())
                .await
            {
                error!("[{}] failed to store onboarding question: {e}", identity.id);
            }
            self.send_text(&turn.durable_id, &question).await;
        }
    }
}
