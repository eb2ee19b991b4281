//! Collaborator interfaces the scene depends on.
//!
//! Model inference, speech synthesis and world queries live behind these
//! traits so the turn-taking core can run against real backends or the
//! defaults in [`policies`](crate::application::policies).

use std::time::Duration;

use async_trait::async_trait;

use parley_core::actor::ActorRef;
use parley_core::error::ParleyError;
use parley_core::event::EventData;

use crate::domain::actors::{Npc, Player};

/// Everything a policy may look at when choosing who acts next.
#[derive(Debug, Clone)]
pub struct SceneContext {
    /// The player.
    pub player: ActorRef,
    /// Who the player is addressing, if anyone.
    pub target: Option<ActorRef>,
    /// NPCs that can hear the player.
    pub hearing_npcs: Vec<Npc>,
}

/// A policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorPick {
    /// The actor who acts next.
    pub actor: ActorRef,
    /// Why, in free text. May be empty.
    pub reason: String,
}

/// Chooses which actor acts next.
#[async_trait]
pub trait ActorPolicy: Send + Sync {
    /// Picks the next actor. Must return the player or one of the hearing
    /// NPCs.
    async fn pick_actor(&self, context: &SceneContext) -> Result<ActorPick, ParleyError>;
}

/// Input of an NPC turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// The acting NPC.
    pub npc: Npc,
    /// Other NPCs in earshot.
    pub other_hearing_npcs: Vec<Npc>,
    /// Who the player is addressing, if anyone.
    pub target: Option<ActorRef>,
    /// The policy's reason for picking this NPC.
    pub reason: String,
}

/// One line an NPC wants to say.
#[derive(Debug, Clone, PartialEq)]
pub struct SpokenLine {
    /// Text to voice.
    pub text: String,
    /// Who the line is addressed to.
    pub target: Option<ActorRef>,
}

/// What an NPC decided to do on its turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Lines to say, in order.
    pub lines: Vec<SpokenLine>,
    /// Other events to send to the game.
    pub events: Vec<EventData>,
}

/// Produces an NPC's turn.
#[async_trait]
pub trait TurnExecutor: Send + Sync {
    /// Decides what `request.npc` does. May be slow.
    async fn act_out(&self, request: &TurnRequest) -> Result<TurnOutcome, ParleyError>;
}

/// A synthesized voice file.
#[derive(Debug, Clone, PartialEq)]
pub struct Voiceover {
    /// Path of the voice file on disk.
    pub file_path: String,
    /// Playback length.
    pub duration: Duration,
    /// Pitch the game should apply.
    pub pitch: f64,
}

/// Text-to-speech backend.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Voices `text` for `npc`. `None` means nothing could be produced.
    async fn synthesize(&self, npc: &Npc, text: &str) -> Result<Option<Voiceover>, ParleyError>;
}

/// Read access to the world around the player.
#[async_trait]
pub trait SceneDirectory: Send + Sync {
    /// Fresh state of the local player.
    async fn local_player(&self) -> Result<Player, ParleyError>;

    /// Identity of the local player.
    async fn player_ref(&self) -> Result<ActorRef, ParleyError> {
        Ok(self.local_player().await?.actor_ref)
    }

    /// Identity of the local player if it was already looked up. Never
    /// talks to the game, so it is safe to call from a bus handler.
    fn known_player_ref(&self) -> Option<ActorRef>;

    /// NPCs that can hear `listener`. An NPC `target` is always included.
    async fn hearing_npcs(
        &self,
        listener: &ActorRef,
        target: Option<&ActorRef>,
    ) -> Result<Vec<Npc>, ParleyError>;

    /// Looks up an NPC.
    async fn npc(&self, ref_id: &str) -> Result<Npc, ParleyError>;

    /// Who the player is currently addressing.
    fn current_target(&self) -> Option<ActorRef>;

    /// Forgets cached world state.
    fn clear_cache(&self) {}
}
