//! Response composition — strategy per journey stage, provider call for
//! the generated ones.

use super::Gateway;
use forma_core::context::{Context, ContextEntry};
use forma_memory::{Direction, StoredMessage};
use tracing::{error, info};

const FORM_ANALYSIS_INSTRUCTION: &str = "\
The client sent a video for a form check. Using the video analysis below, \
give focused technique feedback: what looks solid, what to fix first, and \
one cue to try next session.";

const FOOD_ANALYSIS_INSTRUCTION: &str = "\
The client sent a photo of a meal. Using the description below, estimate \
calories and protein, note anything off-plan, and give one practical \
suggestion.";

/// Map stored history onto provider roles. The caller excludes the turn
/// currently being answered.
pub(super) fn context_entries(history: &[StoredMessage]) -> Vec<ContextEntry> {
    history
        .iter()
        .map(|m| ContextEntry {
            role: match m.direction {
                Direction::Inbound => "user".to_string(),
                Direction::Outbound => "assistant".to_string(),
            },
            content: m.content.clone(),
        })
        .collect()
}

impl Gateway {
    /// Plain conversational reply in the coach's voice.
    pub(super) async fn general_reply(
        &self,
        history: &[StoredMessage],
        turn_text: &str,
    ) -> String {
        self.generated_reply(&self.prompts.persona, history, turn_text)
            .await
    }

    /// Technique feedback from resolved video analysis.
    pub(super) async fn form_analysis_reply(
        &self,
        history: &[StoredMessage],
        turn_text: &str,
        media_text: &str,
    ) -> String {
        let system = format!("{}\n\n{FORM_ANALYSIS_INSTRUCTION}", self.prompts.persona);
        let message = format!("{turn_text}\n\n{media_text}");
        self.generated_reply(&system, history, message.trim()).await
    }

    /// Nutrition breakdown from a resolved meal photo.
    pub(super) async fn food_analysis_reply(
        &self,
        history: &[StoredMessage],
        turn_text: &str,
        media_text: &str,
    ) -> String {
        let system = format!("{}\n\n{FOOD_ANALYSIS_INSTRUCTION}", self.prompts.persona);
        let message = format!("{turn_text}\n\n{media_text}");
        self.generated_reply(&system, history, message.trim()).await
    }

    /// One provider call; any failure falls back to the apology wording.
    async fn generated_reply(
        &self,
        system_prompt: &str,
        history: &[StoredMessage],
        message: &str,
    ) -> String {
        let context = Context {
            system_prompt: system_prompt.to_string(),
            history: context_entries(history),
            current_message: message.to_string(),
            model: None,
        };

        match self.chat_provider.complete(&context).await {
            Ok(response) => {
                info!(
                    "response composed | provider: {} | {}ms",
                    response.metadata.provider_used, response.metadata.processing_time_ms
                );
                response.text
            }
            Err(e) => {
                error!("response generation failed: {e}");
                self.prompts.apology.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_context_entries_role_mapping() {
        let history = vec![
            StoredMessage {
                id: "1".into(),
                direction: Direction::Inbound,
                content: "hello".into(),
                timestamp: Utc::now(),
            },
            StoredMessage {
                id: "2".into(),
                direction: Direction::Outbound,
                content: "hey!".into(),
                timestamp: Utc::now(),
            },
        ];
        let entries = context_entries(&history);
        assert_eq!(entries[0].role, "user");
        assert_eq!(entries[1].role, "assistant");
        assert_eq!(entries[1].content, "hey!");
    }
}
