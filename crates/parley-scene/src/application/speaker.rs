//! The scene speaker: owner of the scene lock and the actor locks.
//!
//! Every voiced NPC line goes through [`SceneSpeaker::say`], which only lets
//! the NPC speak while it still holds the scene and re-checks that after
//! every await. The speaker also reacts to game events that take the floor
//! away: deaths, the player starting or finishing to talk, and the player
//! walking into another cell.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use parley_core::actor::ActorRef;
use parley_core::bus::{EventHandler, EventProducer};
use parley_core::error::ParleyError;
use parley_core::data::Cell;
use parley_core::event::{Event, EventData};

use crate::application::ports::{SceneDirectory, VoiceSynthesizer, Voiceover};
use crate::config::SceneConfig;
use crate::domain::actor_lock::ActorLockRegistry;
use crate::domain::actors::Npc;
use crate::domain::scene_lock::{SceneLock, SceneLockSnapshot};

/// Shortest time a voiced line keeps the scene.
const MIN_SCENE_HOLD: Duration = Duration::from_secs(1);

/// Scene speaker.
pub struct SceneSpeaker {
    release_before_end: Duration,
    silence_radius_m: f64,
    producer: Arc<dyn EventProducer>,
    directory: Arc<dyn SceneDirectory>,
    voice: Arc<dyn VoiceSynthesizer>,
    scene_lock: SceneLock,
    actor_locks: Arc<ActorLockRegistry>,
    dead: Mutex<HashSet<ActorRef>>,
}

impl SceneSpeaker {
    /// Creates a speaker with an unlocked scene.
    #[must_use]
    pub fn new(
        config: &SceneConfig,
        producer: Arc<dyn EventProducer>,
        directory: Arc<dyn SceneDirectory>,
        voice: Arc<dyn VoiceSynthesizer>,
    ) -> Self {
        Self {
            release_before_end: config.release_before_end(),
            silence_radius_m: config.silence_radius_m,
            producer,
            directory,
            voice,
            scene_lock: SceneLock::new(),
            actor_locks: Arc::new(ActorLockRegistry::new()),
            dead: Mutex::new(HashSet::new()),
        }
    }

    /// Locks the scene and returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::SceneAlreadyLocked`] if the scene is locked.
    pub fn lock_scene(&self) -> Result<u64, ParleyError> {
        self.scene_lock.lock()
    }

    /// Unlocks the scene.
    pub fn unlock_scene(&self) {
        self.scene_lock.unlock();
    }

    /// Schedules an unlock that only happens if the scene generation has
    /// not changed after `delay`.
    pub fn unlock_scene_later_if_same_generation(&self, delay: Duration) -> JoinHandle<()> {
        self.scene_lock.unlock_later_if_same_generation(delay)
    }

    /// Whether the scene is locked.
    #[must_use]
    pub fn is_scene_locked(&self) -> bool {
        self.scene_lock.is_locked()
    }

    /// Whether the scene is locked at `generation`.
    #[must_use]
    pub fn is_scene_locked_at(&self, generation: u64) -> bool {
        self.scene_lock.is_locked_at(generation)
    }

    /// Whether the scene is locked and held by `actor`.
    #[must_use]
    pub fn is_scene_locked_by(&self, actor: &ActorRef) -> bool {
        self.scene_lock.is_locked_by(actor)
    }

    /// Hands the scene to `holder` if `generation` is still current.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::HolderBeforeLock`] if the scene is unlocked.
    pub fn set_scene_holder(&self, generation: u64, holder: ActorRef) -> Result<bool, ParleyError> {
        self.scene_lock.set_holder(generation, holder)
    }

    /// Current state of the scene lock.
    #[must_use]
    pub fn scene_snapshot(&self) -> SceneLockSnapshot {
        self.scene_lock.snapshot()
    }

    /// Whether `actor`'s lock is currently held.
    #[must_use]
    pub fn is_actor_speaking(&self, actor: &ActorRef) -> bool {
        self.actor_locks.get(actor).is_locked()
    }

    /// Voices `text` for `npc`, addressed to `target`.
    ///
    /// Does nothing unless `npc` holds the scene. Returns the length of the
    /// line when it was sent to the game.
    ///
    /// # Errors
    ///
    /// Returns an error if voice synthesis fails.
    pub async fn say(
        &self,
        npc: &Npc,
        text: &str,
        target: Option<&ActorRef>,
    ) -> Result<Option<Duration>, ParleyError> {
        let actor = &npc.actor_ref;
        let scene = self.scene_lock.snapshot();
        if !scene.locked {
            debug!(npc = %actor, "say called while the scene is unlocked, skipping");
            return Ok(None);
        }
        if scene.holder.as_ref() != Some(actor) {
            debug!(npc = %actor, holder = ?scene.holder, "say called for an npc not holding the scene");
            return Ok(None);
        }
        let generation = scene.generation;

        let Some((voiceover, file_path)) = self.produce_voiceover(npc, text).await? else {
            if self.scene_lock.unlock_if_same_generation(generation) {
                debug!(npc = %actor, generation, "no voiceover, released the scene");
            } else {
                debug!(npc = %actor, generation, "no voiceover, scene already moved on");
            }
            return Ok(None);
        };

        if !self.still_holds(actor, generation) {
            debug!(npc = %actor, generation, "npc lost the scene during synthesis");
            return Ok(None);
        }
        if self.is_dead(npc) {
            debug!(npc = %actor, "npc died during synthesis");
            self.scene_lock.unlock_if_same_generation(generation);
            return Ok(None);
        }

        let duration = voiceover.duration;
        let actor_lock = self.actor_locks.get(actor);
        actor_lock.acquire(duration).await;

        if !self.still_holds(actor, generation) {
            actor_lock.release();
            debug!(npc = %actor, generation, "npc lost the scene while waiting for its actor lock");
            return Ok(None);
        }
        if self.is_dead(npc) {
            actor_lock.release();
            self.scene_lock.unlock_if_same_generation(generation);
            debug!(npc = %actor, "npc died while waiting for its actor lock");
            return Ok(None);
        }

        let hold = duration
            .saturating_sub(self.release_before_end)
            .max(MIN_SCENE_HOLD);
        self.scene_lock.unlock_later_if_generation(generation, hold);
        debug!(npc = %actor, ?duration, ?hold, "npc speaks");

        self.producer.produce_event(Event::new(EventData::NpcSayMp3 {
            npc_ref_id: actor.ref_id.clone(),
            file_path,
            pitch: voiceover.pitch,
            target_ref_id: target.map(|t| t.ref_id.clone()),
            duration_sec: duration.as_secs_f64(),
        }));
        Ok(Some(duration))
    }

    async fn produce_voiceover(
        &self,
        npc: &Npc,
        text: &str,
    ) -> Result<Option<(Voiceover, String)>, ParleyError> {
        let spoken = strip_non_verbal(text);
        if spoken.is_empty() {
            return Ok(None);
        }
        let Some(voiceover) = self.voice.synthesize(npc, &spoken).await? else {
            return Ok(None);
        };
        match game_voice_path(&voiceover.file_path) {
            Some(path) => {
                let path = path.to_owned();
                Ok(Some((voiceover, path)))
            }
            None => {
                error!(path = %voiceover.file_path, "voice file is outside the game's Vo directory");
                Ok(None)
            }
        }
    }

    /// Silences every speaking actor for which `should_shut_up` holds and
    /// frees the scene unless the player holds it.
    pub async fn npcs_shut_up<F>(&self, should_shut_up: F)
    where
        F: Fn(&ActorRef) -> bool + Send + Sync,
    {
        self.silencer().shut_up(should_shut_up).await;
    }

    /// Forgets every death seen so far. Fresh NPC data still reports the
    /// dead ones.
    pub fn forget_deaths(&self) {
        self.dead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of NPCs remembered as dead.
    #[must_use]
    pub fn known_deaths(&self) -> usize {
        self.dead.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Turns `actors` to face `target`.
    pub fn turn_actors_to(&self, actors: &[ActorRef], target: &ActorRef) {
        self.producer.produce_event(Event::new(EventData::TurnActorsTo {
            actor_ref_ids: actors.iter().map(|a| a.ref_id.clone()).collect(),
            target_ref_id: target.ref_id.clone(),
        }));
    }

    fn still_holds(&self, actor: &ActorRef, generation: u64) -> bool {
        let scene = self.scene_lock.snapshot();
        scene.locked && scene.generation == generation && scene.holder.as_ref() == Some(actor)
    }

    fn is_dead(&self, npc: &Npc) -> bool {
        npc.data.is_dead
            || self
                .dead
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&npc.actor_ref)
    }

    fn silencer(&self) -> Silencer {
        Silencer {
            directory: Arc::clone(&self.directory),
            producer: Arc::clone(&self.producer),
            silence_radius_m: self.silence_radius_m,
            scene_lock: self.scene_lock.clone(),
            actor_locks: Arc::clone(&self.actor_locks),
        }
    }

    fn on_npc_death(&self, victim: &ActorRef) {
        self.dead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(victim.clone());

        if self.actor_locks.get(victim).release() {
            // Locating the victim needs the game, whose answers arrive on
            // the bus this handler is blocking.
            let silencer = self.silencer();
            let victim = victim.clone();
            tokio::spawn(async move { silencer.remove_sound(&victim).await });
        }
        if self.scene_lock.holder().as_ref() == Some(victim) {
            debug!(npc = %victim, "scene holder died, unlocking");
            self.scene_lock.unlock();
        }
    }

    fn on_player_speaking(&self) {
        let Some(player) = self.directory.known_player_ref() else {
            warn!("player started speaking before being looked up, not taking the scene");
            return;
        };
        if self.scene_lock.holder().as_ref() != Some(&player) {
            let generation = self.scene_lock.take_over(player);
            debug!(generation, "player started speaking, took the scene");
        }
    }

    /// NPCs left behind in the previous cell stop talking. Finding out who
    /// can still hear the player needs the game, so the work is detached.
    fn on_cell_changed(&self, cell: &Cell) {
        info!(cell = %cell.id, "player changed cell");
        let silencer = self.silencer();
        tokio::spawn(async move {
            let hearing = match silencer.actors_hearing_player().await {
                Ok(hearing) => hearing,
                Err(e) => {
                    warn!(error = %e, "cannot tell who still hears the player after a cell change");
                    return;
                }
            };
            silencer.shut_up(|actor| !hearing.contains(actor)).await;
        });
    }

    fn on_player_finished_speaking(&self) {
        let player = self.directory.known_player_ref();
        if player.is_some() && self.scene_lock.holder() == player {
            debug!("player stopped speaking, releasing the scene");
            self.scene_lock.unlock();
        } else {
            warn!("player stopped speaking without holding the scene, not unlocking");
        }
    }
}

/// The parts of the speaker needed to silence actors away from the bus
/// worker.
struct Silencer {
    directory: Arc<dyn SceneDirectory>,
    producer: Arc<dyn EventProducer>,
    silence_radius_m: f64,
    scene_lock: SceneLock,
    actor_locks: Arc<ActorLockRegistry>,
}

impl Silencer {
    async fn shut_up<F>(&self, should_shut_up: F)
    where
        F: Fn(&ActorRef) -> bool + Send + Sync,
    {
        info!("shutting npcs up");
        for actor_lock in self.actor_locks.all() {
            if actor_lock.is_locked() && should_shut_up(actor_lock.actor()) {
                actor_lock.release();
                self.remove_sound(actor_lock.actor()).await;
            }
        }

        let snapshot = self.scene_lock.snapshot();
        let held_by_npc_or_nobody = snapshot.holder.as_ref().is_none_or(ActorRef::is_npc);
        if snapshot.locked && held_by_npc_or_nobody {
            self.scene_lock.unlock_if_same_generation(snapshot.generation);
        }
    }

    async fn actors_hearing_player(&self) -> Result<Vec<ActorRef>, ParleyError> {
        let player = self.directory.player_ref().await?;
        let npcs = self.directory.hearing_npcs(&player, None).await?;
        Ok(npcs.into_iter().map(|npc| npc.actor_ref).collect())
    }

    /// Stops the sound `actor` is playing if it is an NPC close enough to the
    /// player to be heard.
    async fn remove_sound(&self, actor: &ActorRef) {
        if !actor.is_npc() {
            return;
        }
        let distance_m = match self.distance_to_player_m(actor).await {
            Ok(distance_m) => distance_m,
            Err(e) => {
                warn!(actor = %actor, error = %e, "cannot locate actor to silence it");
                return;
            }
        };
        if distance_m < self.silence_radius_m {
            debug!(actor = %actor, distance_m, "silencing actor");
            self.producer.produce_event(Event::new(EventData::NpcRemoveSound {
                npc_ref_id: actor.ref_id.clone(),
            }));
        }
    }

    async fn distance_to_player_m(&self, actor: &ActorRef) -> Result<f64, ParleyError> {
        let npc = self.directory.npc(&actor.ref_id).await?;
        let player = self.directory.local_player().await?;
        Ok(npc.distance_m(&player.data.position))
    }
}

#[async_trait]
impl EventHandler for SceneSpeaker {
    fn name(&self) -> &'static str {
        "scene_speaker"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        match &event.data {
            EventData::NpcDeath { actor, .. } => self.on_npc_death(actor),
            EventData::SttRecognitionUpdate { text } if !text.is_empty() => {
                self.on_player_speaking();
            }
            EventData::SttRecognitionComplete { .. } => self.on_player_finished_speaking(),
            EventData::CellChanged { cell } => self.on_cell_changed(cell),
            _ => {}
        }
        Ok(())
    }
}

/// Removes stage directions in parentheses or square brackets.
#[must_use]
pub fn strip_non_verbal(text: &str) -> String {
    let text = strip_enclosed(text, '(', ')');
    let text = strip_enclosed(&text, '[', ']');
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_enclosed(text: &str, open: char, close: char) -> String {
    let mut text = text.to_owned();
    while let Some(start) = text.find(open) {
        let after_open = start + open.len_utf8();
        let Some(offset) = text[after_open..].find(close) else {
            break;
        };
        text.replace_range(start..after_open + offset + close.len_utf8(), "");
    }
    text
}

/// Returns the part of `path` the game resolves voice files from, starting
/// at its `Vo` directory.
#[must_use]
pub fn game_voice_path(path: &str) -> Option<&str> {
    path.find("Vo\\")
        .or_else(|| path.find("Vo/"))
        .map(|start| &path[start..])
}
