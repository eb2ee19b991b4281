//! `SceneDirectory` backed by RPC calls to the game.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use parley_bus::rpc::Rpc;
use parley_core::actor::{ActorKind, ActorRef};
use parley_core::bus::EventHandler;
use parley_core::data::{meters_to_units, units_to_meters};
use parley_core::error::ParleyError;
use parley_core::event::{Event, EventData};

use crate::application::npc_cache::NpcCache;
use crate::application::ports::SceneDirectory;
use crate::config::SceneConfig;
use crate::domain::actors::{Npc, Player};

#[derive(Debug, Default)]
struct LookTargets {
    started_speaking_at: Option<ActorRef>,
    stopped_speaking_at: Option<ActorRef>,
}

/// Scene directory that asks the game for everything it does not cache.
///
/// Register it as a bus handler so it can follow what the player looks at.
pub struct RpcSceneDirectory {
    rpc: Arc<Rpc>,
    npcs: Arc<NpcCache>,
    hearing_radius_m: f64,
    close_hearing_radius_m: f64,
    player_ref: Mutex<Option<ActorRef>>,
    look_targets: Mutex<LookTargets>,
}

impl RpcSceneDirectory {
    /// Creates a directory using `npcs` for NPC lookups.
    #[must_use]
    pub fn new(rpc: Arc<Rpc>, npcs: Arc<NpcCache>, config: &SceneConfig) -> Self {
        Self {
            rpc,
            npcs,
            hearing_radius_m: config.hearing_radius_m,
            close_hearing_radius_m: config.close_hearing_radius_m,
            player_ref: Mutex::new(None),
            look_targets: Mutex::new(LookTargets::default()),
        }
    }

    fn look_targets(&self) -> MutexGuard<'_, LookTargets> {
        self.look_targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SceneDirectory for RpcSceneDirectory {
    async fn local_player(&self) -> Result<Player, ParleyError> {
        let player = Player::from_data(self.rpc.get_local_player().await?);
        *self.player_ref.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(player.actor_ref.clone());
        Ok(player)
    }

    async fn player_ref(&self) -> Result<ActorRef, ParleyError> {
        match self.known_player_ref() {
            Some(player_ref) => Ok(player_ref),
            None => Ok(self.local_player().await?.actor_ref),
        }
    }

    fn known_player_ref(&self) -> Option<ActorRef> {
        self.player_ref
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn hearing_npcs(
        &self,
        listener: &ActorRef,
        target: Option<&ActorRef>,
    ) -> Result<Vec<Npc>, ParleyError> {
        let nearby = self
            .rpc
            .get_actors_nearby(
                Some(&listener.ref_id),
                Some(meters_to_units(self.hearing_radius_m)),
                true,
            )
            .await?;

        let mut npcs: Vec<Npc> = Vec::new();
        for actor in nearby {
            if actor.actor_ref.kind != ActorKind::Npc {
                continue;
            }
            let can_see = actor.can_see.unwrap_or(false);
            if !can_see && units_to_meters(actor.distance_ingame) > self.close_hearing_radius_m {
                continue;
            }
            let npc = self.npcs.get(&actor.actor_ref.ref_id).await?;
            if npc.data.is_dead {
                continue;
            }
            npcs.push(npc);
        }

        if let Some(target) = target.filter(|t| t.is_npc()) {
            if !npcs.iter().any(|n| &n.actor_ref == target) {
                npcs.push(self.npcs.get(&target.ref_id).await?);
            }
        }

        debug!(
            listener = %listener,
            count = npcs.len(),
            "npcs in earshot"
        );
        Ok(npcs)
    }

    async fn npc(&self, ref_id: &str) -> Result<Npc, ParleyError> {
        self.npcs.get(ref_id).await
    }

    fn current_target(&self) -> Option<ActorRef> {
        let targets = self.look_targets();
        targets
            .stopped_speaking_at
            .clone()
            .or_else(|| targets.started_speaking_at.clone())
    }

    fn clear_cache(&self) {
        self.npcs.clear();
    }
}

#[async_trait]
impl EventHandler for RpcSceneDirectory {
    fn name(&self) -> &'static str {
        "scene_directory"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        match &event.data {
            EventData::PlayerStartsSpeakingLookingAt { actor_ref } => {
                self.look_targets().started_speaking_at.clone_from(actor_ref);
            }
            EventData::PlayerStopsSpeakingLookingAt { actor_ref } => {
                self.look_targets().stopped_speaking_at.clone_from(actor_ref);
            }
            _ => {}
        }
        Ok(())
    }
}
