//! Wire event model.
//!
//! Every message exchanged with the game is an [`Event`]: an envelope with a
//! bus-assigned identifier, an optional correlation to an earlier request,
//! and a tagged payload.

use serde::{Deserialize, Serialize};

use crate::actor::ActorRef;
use crate::data::{ActorNearby, Cell, EnvData, NpcData, PlayerData};

/// Identifier of an event on the wire.
pub type EventId = i64;

/// Placeholder identifier carried by an event that has not been enqueued yet.
pub const UNASSIGNED_EVENT_ID: EventId = -1;

/// An immutable event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the bus when the event is enqueued outbound.
    /// Inbound events carry the peer's own numbering.
    #[serde(default = "unassigned")]
    pub event_id: EventId,
    /// For responses, the `event_id` of the request being answered.
    #[serde(default)]
    pub response_to_event_id: Option<EventId>,
    /// Tagged payload.
    pub data: EventData,
}

fn unassigned() -> EventId {
    UNASSIGNED_EVENT_ID
}

impl Event {
    /// Creates an event that is not yet assigned an identifier.
    #[must_use]
    pub fn new(data: EventData) -> Self {
        Self {
            event_id: UNASSIGNED_EVENT_ID,
            response_to_event_id: None,
            data,
        }
    }

    /// Creates a response to the request with `request_id`.
    #[must_use]
    pub fn response_to(request_id: EventId, data: EventData) -> Self {
        Self {
            event_id: UNASSIGNED_EVENT_ID,
            response_to_event_id: Some(request_id),
            data,
        }
    }

    /// Returns the payload discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.data.event_type()
    }
}

/// Event payload variants, discriminated on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    // --- from the game ---
    /// An actor died.
    NpcDeath {
        /// The actor who died.
        actor: ActorRef,
        /// Who killed them, if known.
        #[serde(default)]
        killer: Option<ActorRef>,
    },
    /// The player started talking while looking at an actor.
    PlayerStartsSpeakingLookingAt {
        /// The actor under the crosshair, if any.
        #[serde(default)]
        actor_ref: Option<ActorRef>,
    },
    /// The player stopped talking while looking at an actor.
    PlayerStopsSpeakingLookingAt {
        /// The actor under the crosshair, if any.
        #[serde(default)]
        actor_ref: Option<ActorRef>,
    },
    /// The player entered another cell.
    CellChanged {
        /// The new cell.
        cell: Cell,
    },

    // --- from the speech listener ---
    /// Partial speech recognition result; non-empty text means the player
    /// is talking.
    SttRecognitionUpdate {
        /// Text recognized so far.
        text: String,
    },
    /// Final speech recognition result.
    SttRecognitionComplete {
        /// The recognized text.
        text: String,
    },

    // --- from the server to the game ---
    /// Play a voiced line for an NPC.
    NpcSayMp3 {
        /// The speaking NPC.
        npc_ref_id: String,
        /// Voice file path relative to the game data directory.
        file_path: String,
        /// Pitch multiplier.
        pitch: f64,
        /// Who the line is addressed to.
        #[serde(default)]
        target_ref_id: Option<String>,
        /// Length of the voice file.
        duration_sec: f64,
    },
    /// Stop any sound an NPC is playing.
    NpcRemoveSound {
        /// The NPC to silence.
        npc_ref_id: String,
    },
    /// Turn actors to face a target.
    TurnActorsTo {
        /// Actors that should turn.
        actor_ref_ids: Vec<String>,
        /// The actor to face.
        target_ref_id: String,
    },
    /// Make an NPC stop fighting.
    NpcStopCombat {
        /// The NPC.
        npc_ref_id: String,
    },

    // --- RPC pairs ---
    /// Request NPC state.
    GetNpcRequest {
        /// The NPC to look up.
        npc_ref_id: String,
    },
    /// Response to [`EventData::GetNpcRequest`].
    GetNpcResponse {
        /// The NPC state.
        npc_data: NpcData,
    },
    /// Request world environment.
    GetEnvRequest,
    /// Response to [`EventData::GetEnvRequest`].
    GetEnvResponse {
        /// The environment.
        env_data: EnvData,
    },
    /// Request local player state.
    GetLocalPlayerRequest,
    /// Response to [`EventData::GetLocalPlayerRequest`].
    GetLocalPlayerResponse {
        /// The player state.
        player_data: PlayerData,
    },
    /// Request actors near another actor.
    GetActorsNearbyRequest {
        /// Actor to search around; the player when absent.
        #[serde(default)]
        actor_ref_id: Option<String>,
        /// Search radius in game units.
        #[serde(default)]
        radius_ingame: Option<f64>,
        /// Whether to test line of sight.
        #[serde(default)]
        test_line_of_sight: Option<bool>,
    },
    /// Response to [`EventData::GetActorsNearbyRequest`].
    GetActorsNearbyResponse {
        /// Actors found.
        actors: Vec<ActorNearby>,
    },
    /// Ask whether a reference still exists in the game.
    IsRefValidRequest {
        /// The reference to check.
        ref_id: String,
    },
    /// Response to [`EventData::IsRefValidRequest`].
    IsRefValidResponse {
        /// Whether the reference exists.
        is_valid: bool,
    },
}

/// Every discriminator [`EventData`] understands.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "npc_death",
    "player_starts_speaking_looking_at",
    "player_stops_speaking_looking_at",
    "cell_changed",
    "stt_recognition_update",
    "stt_recognition_complete",
    "npc_say_mp3",
    "npc_remove_sound",
    "turn_actors_to",
    "npc_stop_combat",
    "get_npc_request",
    "get_npc_response",
    "get_env_request",
    "get_env_response",
    "get_local_player_request",
    "get_local_player_response",
    "get_actors_nearby_request",
    "get_actors_nearby_response",
    "is_ref_valid_request",
    "is_ref_valid_response",
];

impl EventData {
    /// Returns the wire discriminator of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NpcDeath { .. } => "npc_death",
            Self::PlayerStartsSpeakingLookingAt { .. } => "player_starts_speaking_looking_at",
            Self::PlayerStopsSpeakingLookingAt { .. } => "player_stops_speaking_looking_at",
            Self::CellChanged { .. } => "cell_changed",
            Self::SttRecognitionUpdate { .. } => "stt_recognition_update",
            Self::SttRecognitionComplete { .. } => "stt_recognition_complete",
            Self::NpcSayMp3 { .. } => "npc_say_mp3",
            Self::NpcRemoveSound { .. } => "npc_remove_sound",
            Self::TurnActorsTo { .. } => "turn_actors_to",
            Self::NpcStopCombat { .. } => "npc_stop_combat",
            Self::GetNpcRequest { .. } => "get_npc_request",
            Self::GetNpcResponse { .. } => "get_npc_response",
            Self::GetEnvRequest => "get_env_request",
            Self::GetEnvResponse { .. } => "get_env_response",
            Self::GetLocalPlayerRequest => "get_local_player_request",
            Self::GetLocalPlayerResponse { .. } => "get_local_player_response",
            Self::GetActorsNearbyRequest { .. } => "get_actors_nearby_request",
            Self::GetActorsNearbyResponse { .. } => "get_actors_nearby_response",
            Self::IsRefValidRequest { .. } => "is_ref_valid_request",
            Self::IsRefValidResponse { .. } => "is_ref_valid_response",
        }
    }

    /// Returns `true` if `event_type` names a variant of this enum.
    #[must_use]
    pub fn is_known_type(event_type: &str) -> bool {
        KNOWN_EVENT_TYPES.contains(&event_type)
    }
}
