//! Actor identity.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The kind of actor a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// The live player driven by the game process.
    Player,
    /// A server-controlled NPC.
    Npc,
    /// A creature. Only a few named creatures can take part in a scene.
    Creature,
}

/// Reference to an actor in the game world.
///
/// Two references are the same actor when their `ref_id` matches; the other
/// fields are descriptive and may lag behind the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRef {
    /// Game reference identifier.
    pub ref_id: String,
    /// Actor kind.
    #[serde(rename = "type")]
    pub kind: ActorKind,
    /// Display name.
    pub name: String,
    /// Whether the actor is female.
    pub female: bool,
}

impl ActorRef {
    /// Creates a new actor reference.
    #[must_use]
    pub fn new(ref_id: impl Into<String>, kind: ActorKind, name: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            kind,
            name: name.into(),
            female: false,
        }
    }

    /// Returns `true` if this actor is the externally controlled player.
    #[must_use]
    pub fn is_player(&self) -> bool {
        self.kind == ActorKind::Player
    }

    /// Returns `true` if this actor is an NPC.
    #[must_use]
    pub fn is_npc(&self) -> bool {
        self.kind == ActorKind::Npc
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.ref_id == other.ref_id
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ref_id.hash(state);
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ref_id)
    }
}
