//! Payload records carried by RPC responses and game events.
//!
//! Only the fields the scene core reads are modeled. Everything else the
//! game sends is kept in `extra` so that a newer game build never fails
//! decoding here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actor::ActorRef;

/// Number of meters in one in-game distance unit (one yard is 64 units).
const METERS_PER_UNIT: f64 = 0.9144 / 64.0;

/// Converts an in-game distance to meters.
#[must_use]
pub fn units_to_meters(units: f64) -> f64 {
    units * METERS_PER_UNIT
}

/// Converts a distance in meters to in-game units.
#[must_use]
pub fn meters_to_units(meters: f64) -> f64 {
    meters / METERS_PER_UNIT
}

/// A point in the game world, in game units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Euclidean distance to `other`, in game units.
    #[must_use]
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A game cell (interior or exterior area).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Cell identifier.
    pub id: String,
    /// Name shown to the player.
    pub display_name: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// NPC state as reported by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcData {
    /// Game reference identifier.
    pub ref_id: String,
    /// Display name.
    pub name: String,
    /// Whether the NPC is female.
    pub female: bool,
    /// Whether the NPC is dead.
    #[serde(default)]
    pub is_dead: bool,
    /// Current position.
    #[serde(default)]
    pub position: Position,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Local player state as reported by the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Game reference identifier.
    pub ref_id: String,
    /// Display name.
    pub name: String,
    /// Whether the player character is female.
    pub female: bool,
    /// Current position.
    #[serde(default)]
    pub position: Position,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// World environment: calendar, daylight, and weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvData {
    /// Current in-game year.
    pub current_year: i32,
    /// Current in-game month.
    pub current_month: u32,
    /// Current in-game day.
    pub current_day: u32,
    /// Current in-game hour, fractional.
    pub current_hour: f64,
    /// Current weather name.
    pub current_weather: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a `get_actors_nearby_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorNearby {
    /// The nearby actor.
    pub actor_ref: ActorRef,
    /// Distance to the queried actor, in game units.
    pub distance_ingame: f64,
    /// Whether there is a line of sight to the queried actor, when tested.
    #[serde(default)]
    pub can_see: Option<bool>,
}
