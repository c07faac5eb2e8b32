//! Per-identity pending state.
//!
//! Each flow is an independent flag; the dispatcher mutates them and the
//! gateway holds one `PendingState` per identity in memory.

use serde::{Deserialize, Serialize};

/// Whether a flow is waiting for a follow-up attachment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaWait {
    #[default]
    None,
    AwaitingMedia,
}

/// Progress through the paid-ad funnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunnelState {
    #[default]
    None,
    Step(u8),
    Completed,
}

/// Where onboarding expects the next user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingCursor {
    Goals,
    TrainingDays,
    Injuries,
}

impl OnboardingCursor {
    /// The cursor after this answer, or `None` when onboarding is done.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Goals => Some(Self::TrainingDays),
            Self::TrainingDays => Some(Self::Injuries),
            Self::Injuries => None,
        }
    }
}

/// Onboarding flow state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingState {
    #[default]
    None,
    InProgress {
        expected: OnboardingCursor,
    },
}

/// All pending flows for one identity. Flags are idempotently settable
/// and always clearable; only one instance exists per identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingState {
    pub form_check: MediaWait,
    pub food_analysis: MediaWait,
    pub ad_funnel: FunnelState,
    /// Funnel scenario tag set when the lead was detected.
    pub funnel_scenario: Option<String>,
    pub onboarding: OnboardingState,
}

impl PendingState {
    pub fn is_idle(&self) -> bool {
        self.form_check == MediaWait::None
            && self.food_analysis == MediaWait::None
            && matches!(self.ad_funnel, FunnelState::None | FunnelState::Completed)
            && self.onboarding == OnboardingState::None
    }

    /// Whether funnel handling should take priority for this identity.
    pub fn in_funnel(&self) -> bool {
        matches!(self.ad_funnel, FunnelState::Step(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert!(PendingState::default().is_idle());
    }

    #[test]
    fn test_in_funnel() {
        let mut state = PendingState::default();
        assert!(!state.in_funnel());
        state.ad_funnel = FunnelState::Step(2);
        assert!(state.in_funnel());
        state.ad_funnel = FunnelState::Completed;
        assert!(!state.in_funnel());
    }

    #[test]
    fn test_onboarding_cursor_sequence() {
        assert_eq!(
            OnboardingCursor::Goals.next(),
            Some(OnboardingCursor::TrainingDays)
        );
        assert_eq!(
            OnboardingCursor::TrainingDays.next(),
            Some(OnboardingCursor::Injuries)
        );
        assert_eq!(OnboardingCursor::Injuries.next(), None);
    }
}
