//! Default scripted sales funnel.
//!
//! Three fixed steps: qualify, pitch, close. The step wording lives here;
//! when the funnel runs is the dispatcher's call. Real campaigns swap this
//! for their own `FunnelScript` implementation.

use async_trait::async_trait;
use forma_core::{
    error::FormaError,
    state::FunnelState,
    traits::{FunnelReply, FunnelScript},
};

pub struct ScriptedFunnel;

#[async_trait]
impl FunnelScript for ScriptedFunnel {
    async fn step_reply(
        &self,
        scenario: &str,
        state: FunnelState,
        _turn_text: &str,
    ) -> Result<FunnelReply, FormaError> {
        let step = match state {
            FunnelState::Step(n) => n,
            FunnelState::None => 1,
            FunnelState::Completed => {
                return Ok(FunnelReply {
                    text: "You're all set — I'll be in touch with the next steps soon."
                        .to_string(),
                    next: FunnelState::Completed,
                });
            }
        };

        let reply = match step {
            1 => FunnelReply {
                text: format!(
                    "Thanks for reaching out about the {scenario} program! Quick \
                     question so I can point you right: what's your main goal \
                     over the next 12 weeks?"
                ),
                next: FunnelState::Step(2),
            },
            2 => FunnelReply {
                text: "Love it — that's exactly what this program is built for. \
                       It's 1:1 coaching with a custom plan and weekly check-ins. \
                       Want me to send over the details?"
                    .to_string(),
                next: FunnelState::Step(3),
            },
            _ => FunnelReply {
                text: "Here's the sign-up link — spots are limited this round, so \
                       grab yours and I'll see you inside!"
                    .to_string(),
                next: FunnelState::Completed,
            },
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_steps_progress_to_completion() {
        let funnel = ScriptedFunnel;

        let step1 = funnel
            .step_reply("summer-shred", FunnelState::Step(1), "saw your ad")
            .await
            .unwrap();
        assert!(step1.text.contains("summer-shred"));
        assert_eq!(step1.next, FunnelState::Step(2));

        let step2 = funnel
            .step_reply("summer-shred", step1.next, "build muscle")
            .await
            .unwrap();
        assert_eq!(step2.next, FunnelState::Step(3));

        let step3 = funnel
            .step_reply("summer-shred", step2.next, "yes please")
            .await
            .unwrap();
        assert_eq!(step3.next, FunnelState::Completed);

        // Completed stays completed.
        let after = funnel
            .step_reply("summer-shred", step3.next, "thanks")
            .await
            .unwrap();
        assert_eq!(after.next, FunnelState::Completed);
    }

    #[tokio::test]
    async fn test_untracked_state_enters_at_step_one() {
        let funnel = ScriptedFunnel;
        let reply = funnel
            .step_reply("default", FunnelState::None, "hello")
            .await
            .unwrap();
        assert_eq!(reply.next, FunnelState::Step(2));
    }
}
