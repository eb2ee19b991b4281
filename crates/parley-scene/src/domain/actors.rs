//! Scene participants.

use parley_core::actor::{ActorKind, ActorRef};
use parley_core::data::{NpcData, PlayerData, Position, units_to_meters};

/// An NPC known to the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    /// Identity of the NPC.
    pub actor_ref: ActorRef,
    /// State last reported by the game.
    pub data: NpcData,
}

impl Npc {
    /// Builds an NPC from the state reported by the game.
    #[must_use]
    pub fn from_data(data: NpcData) -> Self {
        let mut actor_ref = ActorRef::new(data.ref_id.clone(), ActorKind::Npc, data.name.clone());
        actor_ref.female = data.female;
        Self { actor_ref, data }
    }

    /// Distance from this NPC to `position`, in meters.
    #[must_use]
    pub fn distance_m(&self, position: &Position) -> f64 {
        units_to_meters(self.data.position.distance(position))
    }
}

/// The local player.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Identity of the player.
    pub actor_ref: ActorRef,
    /// State last reported by the game.
    pub data: PlayerData,
}

impl Player {
    /// Builds the player from the state reported by the game.
    #[must_use]
    pub fn from_data(data: PlayerData) -> Self {
        let mut actor_ref = ActorRef::new(data.ref_id.clone(), ActorKind::Player, data.name.clone());
        actor_ref.female = data.female;
        Self { actor_ref, data }
    }
}
