//! Default collaborators for running a scene without a language model or a
//! speech backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use parley_core::error::ParleyError;

use crate::application::ports::{
    ActorPick, ActorPolicy, SceneContext, TurnExecutor, TurnOutcome, TurnRequest, VoiceSynthesizer,
    Voiceover,
};
use crate::domain::actors::Npc;

/// Always gives the floor to the player.
#[derive(Debug, Default)]
pub struct PlayerOnlyPolicy;

#[async_trait]
impl ActorPolicy for PlayerOnlyPolicy {
    async fn pick_actor(&self, context: &SceneContext) -> Result<ActorPick, ParleyError> {
        Ok(ActorPick {
            actor: context.player.clone(),
            reason: String::new(),
        })
    }
}

/// Cycles through the player and every hearing NPC.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    next: AtomicUsize,
}

impl RoundRobinPolicy {
    /// Creates a policy that starts with the player.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActorPolicy for RoundRobinPolicy {
    async fn pick_actor(&self, context: &SceneContext) -> Result<ActorPick, ParleyError> {
        let slots = context.hearing_npcs.len() + 1;
        let slot = self.next.fetch_add(1, Ordering::SeqCst) % slots;
        let actor = match slot.checked_sub(1) {
            Some(index) => context.hearing_npcs[index].actor_ref.clone(),
            None => context.player.clone(),
        };
        Ok(ActorPick {
            actor,
            reason: format!("round robin slot {slot} of {slots}"),
        })
    }
}

/// Lets NPCs pass their turn without saying anything.
#[derive(Debug, Default)]
pub struct SilentTurnExecutor;

#[async_trait]
impl TurnExecutor for SilentTurnExecutor {
    async fn act_out(&self, _request: &TurnRequest) -> Result<TurnOutcome, ParleyError> {
        Ok(TurnOutcome::default())
    }
}

/// Produces no voiceovers.
#[derive(Debug, Default)]
pub struct SilentVoice;

#[async_trait]
impl VoiceSynthesizer for SilentVoice {
    async fn synthesize(&self, _npc: &Npc, _text: &str) -> Result<Option<Voiceover>, ParleyError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::actor::{ActorKind, ActorRef};
    use parley_core::data::NpcData;
    use serde_json::Map;

    fn npc(ref_id: &str) -> Npc {
        Npc::from_data(NpcData {
            ref_id: ref_id.to_owned(),
            name: ref_id.to_owned(),
            female: false,
            is_dead: false,
            position: parley_core::data::Position::default(),
            extra: Map::new(),
        })
    }

    fn context(npcs: &[&str]) -> SceneContext {
        SceneContext {
            player: ActorRef::new("player", ActorKind::Player, "Nerevar"),
            target: None,
            hearing_npcs: npcs.iter().map(|id| npc(id)).collect(),
        }
    }

    #[tokio::test]
    async fn test_player_only_policy_picks_player() {
        let pick = PlayerOnlyPolicy.pick_actor(&context(&["guard"])).await.unwrap();

        assert!(pick.actor.is_player());
    }

    #[tokio::test]
    async fn test_round_robin_cycles_through_everyone() {
        // Arrange
        let policy = RoundRobinPolicy::new();
        let context = context(&["guard", "fargoth"]);

        // Act
        let mut picked = Vec::new();
        for _ in 0..4 {
            picked.push(policy.pick_actor(&context).await.unwrap().actor.ref_id);
        }

        // Assert
        assert_eq!(picked, vec!["player", "guard", "fargoth", "player"]);
    }

    #[tokio::test]
    async fn test_silent_collaborators_produce_nothing() {
        // Arrange
        let request = TurnRequest {
            npc: npc("guard"),
            other_hearing_npcs: Vec::new(),
            target: None,
            reason: String::new(),
        };

        // Act
        let outcome = SilentTurnExecutor.act_out(&request).await.unwrap();
        let voice = SilentVoice.synthesize(&request.npc, "hello").await.unwrap();

        // Assert
        assert_eq!(outcome, TurnOutcome::default());
        assert!(voice.is_none());
    }
}
