//! Shared application state and the wiring of the scene services.

use std::sync::Arc;

use parley_bus::event_bus::EventBus;
use parley_bus::rpc::Rpc;
use parley_core::bus::{EventConsumer, EventProducer};
use parley_core::clock::Clock;
use parley_core::rng::DeterministicRng;
use parley_core::transport::TransportBackend;
use parley_scene::application::coordinator::TurnCoordinator;
use parley_scene::application::directory::RpcSceneDirectory;
use parley_scene::application::npc_cache::NpcCache;
use parley_scene::application::policies::{
    PlayerOnlyPolicy, RoundRobinPolicy, SilentTurnExecutor, SilentVoice,
};
use parley_scene::application::ports::{ActorPolicy, SceneDirectory};
use parley_scene::application::speaker::SceneSpeaker;

use crate::config::{AppConfig, PolicyKind};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The event bus connected to the game.
    pub bus: EventBus,
    /// Scene and actor locks.
    pub speaker: Arc<SceneSpeaker>,
    /// The turn loop.
    pub coordinator: Arc<TurnCoordinator>,
    /// World queries.
    pub directory: Arc<dyn SceneDirectory>,
}

impl AppState {
    /// Builds every scene service on top of `backend` and registers the
    /// inbound handlers. The bus is not started.
    #[must_use]
    pub fn assemble(
        config: &AppConfig,
        backend: Arc<dyn TransportBackend>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        let bus = EventBus::new(config.event_bus.clone(), backend);
        let producer: Arc<dyn EventProducer> = Arc::new(bus.clone());
        let rpc = Arc::new(Rpc::new(config.rpc.clone(), Arc::clone(&producer)));
        let npcs = Arc::new(NpcCache::new(
            Arc::clone(&rpc),
            Arc::clone(&clock),
            config.scene.npc_cache_ttl_ms,
        ));
        let directory = Arc::new(RpcSceneDirectory::new(
            Arc::clone(&rpc),
            Arc::clone(&npcs),
            &config.scene,
        ));
        let speaker = Arc::new(SceneSpeaker::new(
            &config.scene,
            Arc::clone(&producer),
            directory.clone(),
            Arc::new(SilentVoice),
        ));
        let policy: Arc<dyn ActorPolicy> = match config.policy {
            PolicyKind::PlayerOnly => Arc::new(PlayerOnlyPolicy),
            PolicyKind::RoundRobin => Arc::new(RoundRobinPolicy::new()),
        };
        let coordinator = Arc::new(TurnCoordinator::new(
            config.scene.clone(),
            Arc::clone(&speaker),
            directory.clone(),
            policy,
            Arc::new(SilentTurnExecutor),
            producer,
            clock,
            rng,
        ));

        bus.register_handler(rpc);
        bus.register_handler(npcs);
        bus.register_handler(directory.clone());
        bus.register_handler(speaker.clone());

        Self {
            bus,
            speaker,
            coordinator,
            directory,
        }
    }
}
