//! Classified intent types.
//!
//! One tagged variant per category, with the category's structured fields
//! inside the variant, so the dispatcher can match exhaustively and a new
//! category cannot silently fall through to general chat.

use serde::{Deserialize, Serialize};

/// A classified intent with its structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Intent {
    /// Request to change the training program.
    WorkoutEdit {
        #[serde(default)]
        edits: Vec<WorkoutEdit>,
    },
    /// Request for exercise-technique feedback.
    FormCheck,
    /// Request to analyze a meal photo.
    FoodAnalysis,
    /// Request to track calories (always needs a follow-up photo).
    CalorieTracking,
    /// Reply inside a paid-ad sales funnel.
    AdFunnelResponse {
        #[serde(default)]
        scenario: Option<String>,
    },
    /// Anything else.
    GeneralChat,
}

/// One requested program edit. Fields are optional so the dispatcher can
/// ask for whatever the user left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEdit {
    pub action: Option<EditAction>,
    /// Exercise name, e.g. "barbell squat".
    pub exercise: Option<String>,
    /// Workout day/category the edit applies to, e.g. "push day".
    pub category: Option<String>,
}

impl WorkoutEdit {
    /// Names of the fields still missing for this edit to be applicable.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.action.is_none() {
            missing.push("whether to add or remove");
        }
        if self.exercise.as_deref().map_or(true, str::is_empty) {
            missing.push("the exercise name");
        }
        if self.category.as_deref().map_or(true, str::is_empty) {
            missing.push("which workout day it belongs to");
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    Add,
    Remove,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// Result of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    #[serde(flatten)]
    pub intent: Intent,
    /// Model confidence, 0–100.
    #[serde(default)]
    pub confidence: u8,
}

impl IntentResult {
    /// The safe default every failure path converges on.
    pub fn general_chat() -> Self {
        Self {
            intent: Intent::GeneralChat,
            confidence: 0,
        }
    }

    /// Parse a model's structured output. Code fences are tolerated;
    /// anything unparsable is `None` (the caller downgrades to chat).
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = strip_code_fence(raw);
        serde_json::from_str(trimmed).ok()
    }

    /// The intent to act on: below the confidence threshold every
    /// non-chat category degrades to general chat.
    pub fn actionable(&self, threshold: u8) -> Intent {
        if self.confidence >= threshold || self.intent == Intent::GeneralChat {
            self.intent.clone()
        } else {
            Intent::GeneralChat
        }
    }
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Result of the secondary ad-intent detector.
///
/// `is_lead` is mandatory in the wire shape so that output from the main
/// classifier (which also carries a `confidence` field) can never be
/// mistaken for a detector verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdIntent {
    pub is_lead: bool,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub scenario: Option<String>,
}

impl AdIntent {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(strip_code_fence(raw)).ok()
    }
}
