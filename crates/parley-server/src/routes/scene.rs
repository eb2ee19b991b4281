//! Routes for inspecting and steering the scene.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, instrument};

use parley_core::actor::ActorRef;

use crate::error::ApiError;
use crate::state::AppState;

/// Scene lock and coordinator state.
#[derive(Debug, Serialize)]
pub struct SceneResponse {
    /// Whether some actor holds the floor.
    pub locked: bool,
    /// Current scene lock generation.
    pub generation: u64,
    /// The actor holding the floor, if assigned.
    pub holder: Option<ActorRef>,
    /// Whether the coordinator is paused.
    pub paused: bool,
}

/// An NPC that can hear the player.
#[derive(Debug, Serialize)]
pub struct HearingNpc {
    /// Game reference identifier.
    pub ref_id: String,
    /// Display name.
    pub name: String,
    /// Distance to the player, in meters.
    pub distance_m: f64,
    /// Whether the NPC is in the middle of a line.
    pub speaking: bool,
}

fn scene_view(state: &AppState) -> SceneResponse {
    let snapshot = state.speaker.scene_snapshot();
    SceneResponse {
        locked: snapshot.locked,
        generation: snapshot.generation,
        holder: snapshot.holder,
        paused: state.coordinator.is_paused(),
    }
}

/// GET /api/v1/scene
async fn get_scene(State(state): State<AppState>) -> Json<SceneResponse> {
    Json(scene_view(&state))
}

/// GET /api/v1/scene/hearing
#[instrument(skip(state))]
async fn get_hearing(State(state): State<AppState>) -> Result<Json<Vec<HearingNpc>>, ApiError> {
    let player = state.directory.local_player().await?;
    let target = state.directory.current_target();
    let npcs = state
        .directory
        .hearing_npcs(&player.actor_ref, target.as_ref())
        .await?;

    let hearing = npcs
        .iter()
        .map(|npc| HearingNpc {
            ref_id: npc.actor_ref.ref_id.clone(),
            name: npc.actor_ref.name.clone(),
            distance_m: npc.distance_m(&player.data.position),
            speaking: state.speaker.is_actor_speaking(&npc.actor_ref),
        })
        .collect();
    Ok(Json(hearing))
}

/// POST /api/v1/scene/pause
#[instrument(skip(state))]
async fn pause(State(state): State<AppState>) -> Json<SceneResponse> {
    state.coordinator.pause();
    Json(scene_view(&state))
}

/// POST /api/v1/scene/resume
#[instrument(skip(state))]
async fn resume(State(state): State<AppState>) -> Json<SceneResponse> {
    state.coordinator.resume();
    Json(scene_view(&state))
}

/// POST /api/v1/scene/shut-up
#[instrument(skip(state))]
async fn shut_up(State(state): State<AppState>) -> Json<SceneResponse> {
    info!("shut-up requested over http");
    state.coordinator.shut_up().await;
    Json(scene_view(&state))
}

/// Returns the router for the scene.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/scene", get(get_scene))
        .route("/api/v1/scene/hearing", get(get_hearing))
        .route("/api/v1/scene/pause", post(pause))
        .route("/api/v1/scene/resume", post(resume))
        .route("/api/v1/scene/shut-up", post(shut_up))
}
