//! User-facing wording and system prompts.
//!
//! Everything the bot says that is not generated by a model lives here so
//! operators can re-word flows without touching code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    /// System persona for general-chat responses.
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Reply when a form check arrives without a video.
    #[serde(default = "default_ask_form_video")]
    pub ask_form_video: String,
    /// Reply when a food-analysis request arrives without a photo.
    #[serde(default = "default_ask_food_photo")]
    pub ask_food_photo: String,
    /// Reply when calorie tracking is requested. Deliberately worded
    /// differently from `ask_food_photo`.
    #[serde(default = "default_ask_calorie_photo")]
    pub ask_calorie_photo: String,
    /// Reply when a program-edit request names no usable edit at all.
    #[serde(default = "default_ask_edit_details")]
    pub ask_edit_details: String,
    /// Deferred reply when an external edit fails and a follow-up is filed.
    #[serde(default = "default_followup_notice")]
    pub followup_notice: String,
    /// Generic apology when a turn cannot be processed at all.
    #[serde(default = "default_apology")]
    pub apology: String,
    /// Phrase scanned for in *generated* responses; its presence flips the
    /// sender into onboarding.
    #[serde(default = "default_onboarding_trigger")]
    pub onboarding_trigger: String,
    /// Onboarding questions, in order.
    #[serde(default = "default_onboarding_goals")]
    pub onboarding_goals: String,
    #[serde(default = "default_onboarding_training_days")]
    pub onboarding_training_days: String,
    #[serde(default = "default_onboarding_injuries")]
    pub onboarding_injuries: String,
    #[serde(default = "default_onboarding_done")]
    pub onboarding_done: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            ask_form_video: default_ask_form_video(),
            ask_food_photo: default_ask_food_photo(),
            ask_calorie_photo: default_ask_calorie_photo(),
            ask_edit_details: default_ask_edit_details(),
            followup_notice: default_followup_notice(),
            apology: default_apology(),
            onboarding_trigger: default_onboarding_trigger(),
            onboarding_goals: default_onboarding_goals(),
            onboarding_training_days: default_onboarding_training_days(),
            onboarding_injuries: default_onboarding_injuries(),
            onboarding_done: default_onboarding_done(),
        }
    }
}

fn default_persona() -> String {
    "You are the assistant coach for an online fitness coaching service. \
     You answer training and nutrition questions in the coach's voice: \
     direct, encouraging, no fluff. Keep replies short — this is a chat \
     thread, not an article. Never invent client data you don't have."
        .to_string()
}

fn default_ask_form_video() -> String {
    "Happy to check your form! Send me a video of the set and I'll take a \
     close look at your technique."
        .to_string()
}

fn default_ask_food_photo() -> String {
    "Send me a photo of the meal and I'll break it down for you."
        .to_string()
}

fn default_ask_calorie_photo() -> String {
    "Let's log it. Snap a photo of what you're eating and I'll estimate \
     the calories and macros for your diary."
        .to_string()
}

fn default_ask_edit_details() -> String {
    "What would you like me to change? Tell me the exercise, whether to \
     add or remove it, and which workout day it belongs to."
        .to_string()
}

fn default_followup_notice() -> String {
    "I couldn't push that change through just now — I'll sort it and get \
     back to you."
        .to_string()
}

fn default_apology() -> String {
    "Sorry, something went wrong on my end processing that. Mind sending \
     it again?"
        .to_string()
}

fn default_onboarding_trigger() -> String {
    "let's get your program set up".to_string()
}

fn default_onboarding_goals() -> String {
    "First things first: what's the main goal — building muscle, dropping \
     fat, or general fitness?"
        .to_string()
}

fn default_onboarding_training_days() -> String {
    "Got it. How many days a week can you realistically train?".to_string()
}

fn default_onboarding_injuries() -> String {
    "Last one: any injuries or movements I should work around?".to_string()
}

fn default_onboarding_done() -> String {
    "Perfect, that's everything I need. Your program will be ready shortly \
     — I'll ping you when it's up."
        .to_string()
}
