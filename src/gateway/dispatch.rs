//! Action dispatcher — the per-identity state machine.
//!
//! Priority when several things could apply to one turn:
//! 1. a pending-media flow whose media just arrived,
//! 2. ad-funnel handling for tagged leads,
//! 3. fresh intent classification,
//! 4. general chat.

use super::{compose::context_entries, Gateway};
use forma_core::{
    event::AttachmentKind,
    intent::{EditAction, Intent, WorkoutEdit},
    state::{FunnelState, MediaWait, OnboardingCursor, OnboardingState, PendingState},
};
use forma_media::ResolvedMedia;
use forma_memory::{Identity, StoredMessage};
use tracing::{error, info, warn};

impl Gateway {
    /// Decide and produce the reply for one turn.
    pub(super) async fn dispatch_turn(
        &self,
        identity: &Identity,
        turn_text: &str,
        media: &[ResolvedMedia],
        history: &[StoredMessage],
    ) -> String {
        let mut state = self.pending_state(&identity.id).await;
        let reply = self
            .dispatch_with_state(identity, turn_text, media, history, &mut state)
            .await;
        self.set_pending(&identity.id, state).await;
        reply
    }

    async fn dispatch_with_state(
        &self,
        identity: &Identity,
        turn_text: &str,
        media: &[ResolvedMedia],
        history: &[StoredMessage],
        state: &mut PendingState,
    ) -> String {
        let video = media.iter().find(|m| m.kind == AttachmentKind::Video);
        let image = media.iter().find(|m| m.kind == AttachmentKind::Image);
        // History up to, but not including, the turn being answered.
        let context = prior_context(history);

        // 1. A pending flow whose media just arrived outranks whatever the
        //    classifier would say about this turn.
        if state.form_check == MediaWait::AwaitingMedia {
            if let Some(video) = video {
                state.form_check = MediaWait::None;
                info!("[{}] pending form check fulfilled", identity.id);
                return self
                    .form_analysis_reply(context, turn_text, &video.text)
                    .await;
            }
        }
        if state.food_analysis == MediaWait::AwaitingMedia {
            if let Some(image) = image {
                state.food_analysis = MediaWait::None;
                info!("[{}] pending food analysis fulfilled", identity.id);
                return self
                    .food_analysis_reply(context, turn_text, &image.text)
                    .await;
            }
        }

        // 2. Tagged leads and mid-funnel identities bypass classification.
        if identity.lead_source.is_some() || state.in_funnel() {
            return self.funnel_turn(identity, state, turn_text, context).await;
        }

        // 2b. Early-stage untagged contacts get the ad-intent detector.
        if history.len() <= self.funnel_config.early_history_limit {
            let ad = self.classifier.detect_ad_intent(turn_text).await;
            if ad.is_lead && ad.confidence >= self.funnel_config.ad_confidence_threshold {
                let scenario = ad.scenario.unwrap_or_else(|| "default".to_string());
                if let Err(e) = self
                    .store
                    .tag_lead(&identity.id, "paid-ad", Some(&scenario))
                    .await
                {
                    error!("lead tagging failed for {}: {e}", identity.id);
                }
                state.ad_funnel = FunnelState::Step(1);
                state.funnel_scenario = Some(scenario);
                info!("[{}] tagged as ad lead, entering funnel", identity.id);
                return self.funnel_turn(identity, state, turn_text, context).await;
            }
        }

        // 3. Fresh classification.
        let result = self
            .classifier
            .classify(turn_text, &context_entries(context))
            .await;
        let intent = result.actionable(self.classifier.confidence_threshold);
        info!(
            "[{}] intent: {} (confidence {})",
            identity.id,
            intent_label(&intent),
            result.confidence
        );

        match intent {
            Intent::WorkoutEdit { edits } => self.handle_workout_edits(identity, edits).await,
            Intent::FormCheck => match video {
                Some(video) => {
                    self.form_analysis_reply(context, turn_text, &video.text)
                        .await
                }
                // Already asked for a video — don't re-prompt every turn.
                None if state.form_check == MediaWait::AwaitingMedia => {
                    self.general_reply(context, turn_text).await
                }
                None => {
                    state.form_check = MediaWait::AwaitingMedia;
                    self.prompts.ask_form_video.clone()
                }
            },
            Intent::FoodAnalysis => match image {
                Some(image) => {
                    self.food_analysis_reply(context, turn_text, &image.text)
                        .await
                }
                None if state.food_analysis == MediaWait::AwaitingMedia => {
                    self.general_reply(context, turn_text).await
                }
                None => {
                    state.food_analysis = MediaWait::AwaitingMedia;
                    self.prompts.ask_food_photo.clone()
                }
            },
            Intent::CalorieTracking => {
                state.food_analysis = MediaWait::AwaitingMedia;
                self.prompts.ask_calorie_photo.clone()
            }
            Intent::AdFunnelResponse { .. } => {
                // The funnel gate above owns funnel routing; this category
                // from the classifier for an untagged, established identity
                // is handled as chat.
                self.general_reply(context, turn_text).await
            }
            Intent::GeneralChat => {
                if let OnboardingState::InProgress { expected } = state.onboarding {
                    return self.advance_onboarding(state, expected);
                }
                self.general_reply(context, turn_text).await
            }
        }
    }

    /// Apply a batch of program edits, clarifying first if underspecified.
    /// The whole batch is always reported in a single message.
    async fn handle_workout_edits(
        &self,
        identity: &Identity,
        edits: Vec<WorkoutEdit>,
    ) -> String {
        if edits.is_empty() {
            return self.prompts.ask_edit_details.clone();
        }

        // Ask for missing details before touching anything external.
        let mut questions = Vec::new();
        for edit in &edits {
            let missing = edit.missing_fields();
            if !missing.is_empty() {
                let subject = edit.exercise.as_deref().unwrap_or("that change");
                questions.push(format!("for {subject} I still need {}", missing.join(" and ")));
            }
        }
        if !questions.is_empty() {
            return format!("Almost there — {}.", questions.join("; "));
        }

        let mut applied = Vec::new();
        let mut failed = Vec::new();
        for edit in &edits {
            let (Some(action), Some(exercise), Some(category)) = (
                edit.action,
                edit.exercise.as_deref(),
                edit.category.as_deref(),
            ) else {
                continue;
            };

            match self
                .program
                .apply_edit(&identity.id, action, exercise, category)
                .await
            {
                Ok(()) => applied.push(format!("{} {exercise} ({category})", past_tense(action))),
                Err(e) => {
                    warn!("[{}] program edit failed: {e}", identity.id);
                    let description = format!(
                        "{} {exercise} on {category} for {} failed: {e}",
                        action.as_str(),
                        identity.id
                    );
                    if let Err(e) = self.store.record_followup(&identity.id, &description).await {
                        error!("could not record follow-up: {e}");
                    }
                    failed.push(format!("{} {exercise}", action.as_str()));
                }
            }
        }

        let mut parts = Vec::new();
        if !applied.is_empty() {
            parts.push(format!("Done: {}.", applied.join(", ")));
        }
        if !failed.is_empty() {
            parts.push(format!(
                "{} ({})",
                self.prompts.followup_notice,
                failed.join(", ")
            ));
        }
        parts.join(" ")
    }

    /// Route a turn through the funnel script.
    async fn funnel_turn(
        &self,
        identity: &Identity,
        state: &mut PendingState,
        turn_text: &str,
        context: &[StoredMessage],
    ) -> String {
        let scenario = state
            .funnel_scenario
            .clone()
            .or_else(|| identity.funnel_scenario.clone())
            .unwrap_or_else(|| "default".to_string());

        // A tagged lead with no in-process state (fresh restart) re-enters
        // at the first step.
        let current = match state.ad_funnel {
            FunnelState::None => FunnelState::Step(1),
            other => other,
        };

        match self.funnel.step_reply(&scenario, current, turn_text).await {
            Ok(reply) => {
                state.ad_funnel = reply.next;
                if state.funnel_scenario.is_none() {
                    state.funnel_scenario = Some(scenario);
                }
                reply.text
            }
            Err(e) => {
                warn!("[{}] funnel step failed, falling back to chat: {e}", identity.id);
                self.general_reply(context, turn_text).await
            }
        }
    }

    /// Record the onboarding answer position and move the cursor.
    fn advance_onboarding(&self, state: &mut PendingState, current: OnboardingCursor) -> String {
        match current.next() {
            Some(next) => {
                state.onboarding = OnboardingState::InProgress { expected: next };
                self.onboarding_question(next).clone()
            }
            None => {
                state.onboarding = OnboardingState::None;
                self.prompts.onboarding_done.clone()
            }
        }
    }

    pub(super) fn onboarding_question(&self, cursor: OnboardingCursor) -> &String {
        match cursor {
            OnboardingCursor::Goals => &self.prompts.onboarding_goals,
            OnboardingCursor::TrainingDays => &self.prompts.onboarding_training_days,
            OnboardingCursor::Injuries => &self.prompts.onboarding_injuries,
        }
    }

    /// Scan a *generated* response for the onboarding trigger phrase.
    /// Finding it flips the sender into onboarding and yields the first
    /// question, sent exactly once.
    pub(super) async fn maybe_trigger_onboarding(
        &self,
        identity_id: &str,
        response_text: &str,
    ) -> Option<String> {
        let trigger = self.prompts.onboarding_trigger.to_lowercase();
        if trigger.is_empty() || !response_text.to_lowercase().contains(&trigger) {
            return None;
        }

        let mut state = self.pending_state(identity_id).await;
        if state.onboarding != OnboardingState::None {
            return None;
        }
        state.onboarding = OnboardingState::InProgress {
            expected: OnboardingCursor::Goals,
        };
        self.set_pending(identity_id, state).await;

        info!("[{identity_id}] onboarding triggered");
        Some(self.prompts.onboarding_goals.clone())
    }
}

/// History minus the turn currently being answered.
fn prior_context(history: &[StoredMessage]) -> &[StoredMessage] {
    match history.split_last() {
        Some((_, rest)) => rest,
        None => history,
    }
}

fn past_tense(action: EditAction) -> &'static str {
    match action {
        EditAction::Add => "added",
        EditAction::Remove => "removed",
    }
}

fn intent_label(intent: &Intent) -> &'static str {
    match intent {
        Intent::WorkoutEdit { .. } => "workout_edit",
        Intent::FormCheck => "form_check",
        Intent::FoodAnalysis => "food_analysis",
        Intent::CalorieTracking => "calorie_tracking",
        Intent::AdFunnelResponse { .. } => "ad_funnel_response",
        Intent::GeneralChat => "general_chat",
    }
}
