//! Intent classification over a fixed-order model cascade.
//!
//! One structured-output request per turn. Rate-limit errors retry the
//! same model after a fixed backoff, up to the configured count; any other
//! failure advances to the next model immediately. When the whole cascade
//! is exhausted — or the output does not parse — the result degrades to a
//! low-confidence general chat, never an error.

use forma_core::{
    config::ClassifierConfig,
    context::{Context, ContextEntry},
    error::FormaError,
    intent::{AdIntent, IntentResult},
    traits::Provider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CLASSIFY_SYSTEM: &str = "\
You are the intent classifier for a fitness coaching chat service. \
Classify the client's message into exactly one category and respond with \
ONLY a JSON object, no prose, no code fences.\n\
Categories:\n\
- workout_edit: the client wants exercises added to or removed from their \
program. Include an \"edits\" array; each edit has \"action\" (\"add\" or \
\"remove\"), \"exercise\", and \"category\" (the workout day). Omit fields \
the client did not state.\n\
- form_check: the client wants technique feedback on an exercise.\n\
- food_analysis: the client wants a meal analyzed.\n\
- calorie_tracking: the client wants food logged into their diary.\n\
- ad_funnel_response: the client is replying to a paid advertisement.\n\
- general_chat: anything else.\n\
Schema: {\"category\": \"...\", \"confidence\": 0-100, ...category fields}";

const AD_DETECT_SYSTEM: &str = "\
You decide whether a new contact is responding to a paid fitness \
advertisement (mentions of the ad, the promoted challenge, \"I saw your \
ad\", discount codes). Respond with ONLY JSON: {\"is_lead\": true|false, \
\"confidence\": 0-100, \"scenario\": \"<campaign hint or null>\"}";

/// Classifier over an ordered provider cascade.
pub struct Classifier {
    cascade: Vec<Arc<dyn Provider>>,
    max_retries: u32,
    backoff: Duration,
    request_timeout: Duration,
    pub(super) confidence_threshold: u8,
}

impl Classifier {
    pub fn new(cascade: Vec<Arc<dyn Provider>>, config: &ClassifierConfig) -> Self {
        Self {
            cascade,
            max_retries: config.max_retries,
            backoff: Duration::from_secs(config.backoff_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Classify one turn. Downstream always gets a usable result.
    pub async fn classify(&self, turn_text: &str, history: &[ContextEntry]) -> IntentResult {
        let prompt = classification_prompt(turn_text, history);
        match self.run_cascade(&prompt, CLASSIFY_SYSTEM).await {
            Some(raw) => match IntentResult::parse(&raw) {
                Some(result) => result,
                None => {
                    warn!("classifier output did not parse, degrading to chat: {raw:.120}");
                    IntentResult::general_chat()
                }
            },
            None => IntentResult::general_chat(),
        }
    }

    /// Secondary detector: is this early-stage contact an ad lead?
    pub async fn detect_ad_intent(&self, turn_text: &str) -> AdIntent {
        match self.run_cascade(turn_text, AD_DETECT_SYSTEM).await {
            Some(raw) => AdIntent::parse(&raw).unwrap_or_default(),
            None => AdIntent::default(),
        }
    }

    /// Walk the cascade. `None` when every model is exhausted.
    async fn run_cascade(&self, message: &str, system: &str) -> Option<String> {
        for provider in &self.cascade {
            let mut retries = 0;
            loop {
                let mut ctx = Context::new(message);
                ctx.system_prompt = system.to_string();

                let outcome =
                    tokio::time::timeout(self.request_timeout, provider.complete(&ctx)).await;

                match outcome {
                    Ok(Ok(response)) => {
                        debug!("classified via {}", provider.name());
                        return Some(response.text);
                    }
                    Ok(Err(FormaError::RateLimited(reason))) => {
                        if retries >= self.max_retries {
                            warn!(
                                "{}: rate limited, retries exhausted, advancing: {reason}",
                                provider.name()
                            );
                            break;
                        }
                        retries += 1;
                        warn!(
                            "{}: rate limited, retry {retries}/{} after backoff",
                            provider.name(),
                            self.max_retries
                        );
                        tokio::time::sleep(self.backoff).await;
                    }
                    Ok(Err(e)) => {
                        warn!("{} failed, advancing: {e}", provider.name());
                        break;
                    }
                    Err(_) => {
                        warn!("{} timed out, advancing", provider.name());
                        break;
                    }
                }
            }
        }
        None
    }
}

/// The classification user message: recent context plus the turn.
fn classification_prompt(turn_text: &str, history: &[ContextEntry]) -> String {
    if history.is_empty() {
        return format!("Message: {turn_text}");
    }

    let mut context_block = String::new();
    for entry in history.iter().rev().take(6).rev() {
        context_block.push_str(&format!("{}: {}\n", entry.role, entry.content));
    }
    format!("Recent conversation:\n{context_block}\nMessage: {turn_text}")
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{Behavior, MockProvider};
    use super::*;
    use forma_core::intent::Intent;

    fn config(max_retries: u32) -> ClassifierConfig {
        ClassifierConfig {
            max_retries,
            backoff_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_errors_walk_the_cascade_with_retries() {
        let primary = MockProvider::new("primary", Behavior::AlwaysRateLimited);
        let fallback1 = MockProvider::new("fallback1", Behavior::AlwaysRateLimited);
        let fallback2 = MockProvider::new(
            "fallback2",
            Behavior::Succeed(r#"{"category":"form_check","confidence":88}"#.into()),
        );

        let classifier = Classifier::new(
            vec![primary.clone(), fallback1.clone(), fallback2.clone()],
            &config(2),
        );

        let result = classifier.classify("check my squat", &[]).await;
        assert_eq!(result.intent, Intent::FormCheck);
        assert_eq!(result.confidence, 88);

        // Initial attempt + exactly two retries on each rate-limited model.
        assert_eq!(primary.call_count(), 3);
        assert_eq!(fallback1.call_count(), 3);
        assert_eq!(fallback2.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_quota_error_advances_without_retry() {
        let primary = MockProvider::new("primary", Behavior::AlwaysFail);
        let fallback = MockProvider::new(
            "fallback",
            Behavior::Succeed(r#"{"category":"general_chat","confidence":50}"#.into()),
        );

        let classifier = Classifier::new(vec![primary.clone(), fallback.clone()], &config(2));

        let result = classifier.classify("hello", &[]).await;
        assert_eq!(result.intent, Intent::GeneralChat);
        assert_eq!(primary.call_count(), 1, "no retry on non-quota failure");
        assert_eq!(fallback.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_cascade_degrades_to_chat() {
        let a = MockProvider::new("a", Behavior::AlwaysRateLimited);
        let b = MockProvider::new("b", Behavior::AlwaysFail);

        let classifier = Classifier::new(vec![a.clone(), b.clone()], &config(1));

        let result = classifier.classify("anything", &[]).await;
        assert_eq!(result.intent, Intent::GeneralChat);
        assert_eq!(result.confidence, 0);
        assert_eq!(a.call_count(), 2);
        assert_eq!(b.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_degrades_to_chat() {
        let provider = MockProvider::new(
            "p",
            Behavior::Succeed("I think they want a form check!".into()),
        );
        let classifier = Classifier::new(vec![provider.clone()], &config(0));

        let result = classifier.classify("check my bench", &[]).await;
        assert_eq!(result.intent, Intent::GeneralChat);
        assert_eq!(result.confidence, 0);
    }

    #[tokio::test]
    async fn test_ad_detector_requires_distinct_shape() {
        // Main-classifier JSON must not register as a lead verdict.
        let provider = MockProvider::new(
            "p",
            Behavior::Succeed(r#"{"category":"general_chat","confidence":95}"#.into()),
        );
        let classifier = Classifier::new(vec![provider.clone()], &config(0));

        let ad = classifier.detect_ad_intent("hi there").await;
        assert!(!ad.is_lead);
    }

    #[tokio::test]
    async fn test_ad_detector_parses_verdict() {
        let provider = MockProvider::new(
            "p",
            Behavior::Succeed(
                r#"{"is_lead":true,"confidence":84,"scenario":"summer-shred"}"#.into(),
            ),
        );
        let classifier = Classifier::new(vec![provider.clone()], &config(0));

        let ad = classifier.detect_ad_intent("saw your ad about the challenge").await;
        assert!(ad.is_lead);
        assert_eq!(ad.confidence, 84);
        assert_eq!(ad.scenario.as_deref(), Some("summer-shred"));
    }

    #[test]
    fn test_prompt_includes_recent_history() {
        let history = vec![
            ContextEntry {
                role: "user".into(),
                content: "hi".into(),
            },
            ContextEntry {
                role: "assistant".into(),
                content: "hey!".into(),
            },
        ];
        let prompt = classification_prompt("add curls", &history);
        assert!(prompt.contains("user: hi"));
        assert!(prompt.contains("assistant: hey!"));
        assert!(prompt.ends_with("Message: add curls"));
    }
}
