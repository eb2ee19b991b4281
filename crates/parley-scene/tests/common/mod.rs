//! Shared fakes for scene integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::actor::{ActorKind, ActorRef};
use parley_core::data::{NpcData, PlayerData, Position};
use parley_core::error::ParleyError;
use parley_scene::application::ports::{
    ActorPick, ActorPolicy, SceneContext, SceneDirectory, TurnExecutor, TurnOutcome, TurnRequest,
    VoiceSynthesizer, Voiceover,
};
use parley_scene::domain::actors::{Npc, Player};
use serde_json::Map;
use tokio::sync::Notify;

/// One game unit per this many meters.
pub const UNITS_PER_METER: f64 = 64.0 / 0.9144;

pub fn player_ref() -> ActorRef {
    ActorRef::new("player", ActorKind::Player, "Nerevar")
}

pub fn npc_at(ref_id: &str, meters_from_player: f64) -> Npc {
    Npc::from_data(NpcData {
        ref_id: ref_id.to_owned(),
        name: ref_id.to_owned(),
        female: false,
        is_dead: false,
        position: Position {
            x: meters_from_player * UNITS_PER_METER,
            y: 0.0,
            z: 0.0,
        },
        extra: Map::new(),
    })
}

pub fn player() -> Player {
    Player::from_data(PlayerData {
        ref_id: "player".to_owned(),
        name: "Nerevar".to_owned(),
        female: false,
        position: Position::default(),
        extra: Map::new(),
    })
}

/// In-memory world: a player at the origin and a fixed set of NPCs who
/// all hear the player.
#[derive(Default)]
pub struct FakeDirectory {
    npcs: Mutex<HashMap<String, Npc>>,
    target: Mutex<Option<ActorRef>>,
    out_of_earshot: Mutex<HashSet<String>>,
    pub cache_clears: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_npcs(npcs: Vec<Npc>) -> Self {
        let directory = Self::default();
        for npc in npcs {
            directory
                .npcs
                .lock()
                .unwrap()
                .insert(npc.actor_ref.ref_id.clone(), npc);
        }
        directory
    }

    pub fn set_target(&self, target: Option<ActorRef>) {
        *self.target.lock().unwrap() = target;
    }

    /// Keeps the NPC known but stops listing it as hearing the player.
    pub fn move_out_of_earshot(&self, ref_id: &str) {
        self.out_of_earshot.lock().unwrap().insert(ref_id.to_owned());
    }
}

#[async_trait]
impl SceneDirectory for FakeDirectory {
    async fn local_player(&self) -> Result<Player, ParleyError> {
        Ok(player())
    }

    fn known_player_ref(&self) -> Option<ActorRef> {
        Some(player_ref())
    }

    async fn hearing_npcs(
        &self,
        _listener: &ActorRef,
        _target: Option<&ActorRef>,
    ) -> Result<Vec<Npc>, ParleyError> {
        let out_of_earshot = self.out_of_earshot.lock().unwrap().clone();
        let mut npcs: Vec<Npc> = self
            .npcs
            .lock()
            .unwrap()
            .values()
            .filter(|n| !out_of_earshot.contains(&n.actor_ref.ref_id))
            .cloned()
            .collect();
        npcs.sort_by(|a, b| a.actor_ref.ref_id.cmp(&b.actor_ref.ref_id));
        Ok(npcs)
    }

    async fn npc(&self, ref_id: &str) -> Result<Npc, ParleyError> {
        self.npcs
            .lock()
            .unwrap()
            .get(ref_id)
            .cloned()
            .ok_or_else(|| ParleyError::Collaborator(format!("unknown npc {ref_id}")))
    }

    fn current_target(&self) -> Option<ActorRef> {
        self.target.lock().unwrap().clone()
    }

    fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Voices every line with a fixed duration, optionally after a delay.
pub struct FixedVoice {
    pub duration: Duration,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl FixedVoice {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(duration: Duration, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(duration)
        }
    }
}

#[async_trait]
impl VoiceSynthesizer for FixedVoice {
    async fn synthesize(&self, npc: &Npc, text: &str) -> Result<Option<Voiceover>, ParleyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_owned());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Some(Voiceover {
            file_path: format!("/games/mw/Data Files/Sound/Vo/parley/{}_{n}.mp3", npc.actor_ref.ref_id),
            duration: self.duration,
            pitch: 1.0,
        }))
    }
}

/// Takes a while and then produces no voiceover, like a backend that gave up.
pub struct SlowSilentVoice {
    pub delay: Duration,
}

#[async_trait]
impl VoiceSynthesizer for SlowSilentVoice {
    async fn synthesize(&self, _npc: &Npc, _text: &str) -> Result<Option<Voiceover>, ParleyError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }
}

/// Picks the actors it was given, in order, then the player forever.
pub struct ScriptedPolicy {
    picks: Mutex<Vec<ActorRef>>,
}

impl ScriptedPolicy {
    pub fn new(mut picks: Vec<ActorRef>) -> Self {
        picks.reverse();
        Self {
            picks: Mutex::new(picks),
        }
    }
}

#[async_trait]
impl ActorPolicy for ScriptedPolicy {
    async fn pick_actor(&self, context: &SceneContext) -> Result<ActorPick, ParleyError> {
        let actor = self
            .picks
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| context.player.clone());
        Ok(ActorPick {
            actor,
            reason: "scripted".to_owned(),
        })
    }
}

/// Picks one actor, but only once the gate opens.
pub struct GatedPolicy {
    actor: ActorRef,
    gate: Arc<Notify>,
    pub started: Arc<Notify>,
}

impl GatedPolicy {
    pub fn new(actor: ActorRef, gate: Arc<Notify>) -> Self {
        Self {
            actor,
            gate,
            started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ActorPolicy for GatedPolicy {
    async fn pick_actor(&self, _context: &SceneContext) -> Result<ActorPick, ParleyError> {
        self.started.notify_one();
        self.gate.notified().await;
        Ok(ActorPick {
            actor: self.actor.clone(),
            reason: "gated".to_owned(),
        })
    }
}

/// Returns a fixed outcome, optionally waiting for a signal first.
pub struct ScriptedExecutor {
    outcome: TurnOutcome,
    gate: Option<Arc<Notify>>,
    pub started: Arc<Notify>,
    pub requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedExecutor {
    pub fn new(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            gate: None,
            started: Arc::new(Notify::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(outcome: TurnOutcome, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(outcome)
        }
    }
}

#[async_trait]
impl TurnExecutor for ScriptedExecutor {
    async fn act_out(&self, request: &TurnRequest) -> Result<TurnOutcome, ParleyError> {
        self.requests.lock().unwrap().push(request.clone());
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.outcome.clone())
    }
}

/// Fails every turn.
pub struct FailingExecutor;

#[async_trait]
impl TurnExecutor for FailingExecutor {
    async fn act_out(&self, _request: &TurnRequest) -> Result<TurnOutcome, ParleyError> {
        Err(ParleyError::Collaborator("model backend unavailable".to_owned()))
    }
}
