//! The turn coordinator: the loop that decides who speaks next.
//!
//! Every tick it takes the scene, asks the policy for the next actor and
//! carries the turn out. Each await is followed by a generation or holder
//! check; a failed check means the scene was taken over and the rest of the
//! turn is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use parley_core::actor::ActorRef;
use parley_core::bus::EventProducer;
use parley_core::clock::Clock;
use parley_core::error::ParleyError;
use parley_core::event::Event;
use parley_core::rng::DeterministicRng;

use crate::application::ports::{ActorPolicy, SceneContext, SceneDirectory, TurnExecutor, TurnRequest};
use crate::application::speaker::SceneSpeaker;
use crate::config::SceneConfig;

/// How a coordinator cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle did not start: paused, scene busy, or inside the shut-up
    /// window.
    Skipped,
    /// The scene was taken over while the cycle was in flight.
    Preempted,
    /// The player was picked; the scene was released for them.
    ExternalTurn,
    /// An NPC carried out its turn.
    Acted,
    /// The turn failed; the scene was released.
    Failed,
}

/// The turn coordinator.
pub struct TurnCoordinator {
    config: SceneConfig,
    speaker: Arc<SceneSpeaker>,
    directory: Arc<dyn SceneDirectory>,
    policy: Arc<dyn ActorPolicy>,
    executor: Arc<dyn TurnExecutor>,
    producer: Arc<dyn EventProducer>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn DeterministicRng>>,
    cycle: tokio::sync::Mutex<()>,
    paused: AtomicBool,
    last_shut_up_at: Mutex<Option<DateTime<Utc>>>,
    player_acted_last: AtomicBool,
}

impl TurnCoordinator {
    /// Creates a running (not paused) coordinator.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: SceneConfig,
        speaker: Arc<SceneSpeaker>,
        directory: Arc<dyn SceneDirectory>,
        policy: Arc<dyn ActorPolicy>,
        executor: Arc<dyn TurnExecutor>,
        producer: Arc<dyn EventProducer>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        Self {
            config,
            speaker,
            directory,
            policy,
            executor,
            producer,
            clock,
            rng: Mutex::new(rng),
            cycle: tokio::sync::Mutex::new(()),
            paused: AtomicBool::new(false),
            last_shut_up_at: Mutex::new(None),
            player_acted_last: AtomicBool::new(false),
        }
    }

    /// Stops starting new cycles.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("scene progression paused");
    }

    /// Starts cycles again with fresh world state.
    pub fn resume(&self) {
        self.directory.clear_cache();
        self.speaker.forget_deaths();
        self.paused.store(false, Ordering::SeqCst);
        info!("scene progression resumed");
    }

    /// Whether the coordinator is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Handles a player "shut up" command: silences every NPC and holds
    /// back new cycles for the shut-up window.
    pub async fn shut_up(&self) {
        *self
            .last_shut_up_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.clock.now());
        self.speaker.npcs_shut_up(|_| true).await;
    }

    fn within_shut_up_window(&self) -> bool {
        let last = *self
            .last_shut_up_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let window = chrono::Duration::milliseconds(
            i64::try_from(self.config.shut_up_window_ms).unwrap_or(i64::MAX),
        );
        last.is_some_and(|at| self.clock.now() - at < window)
    }

    /// Spawns the tick loop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(self.config.tick_interval());
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let outcome = self.tick().await;
                debug!(?outcome, "scene tick");
            }
        })
    }

    /// Runs one tick: a cycle unless the coordinator is paused, the scene is
    /// busy, or a shut-up command is recent.
    pub async fn tick(&self) -> CycleOutcome {
        if self.speaker.is_scene_locked() || self.within_shut_up_window() || self.is_paused() {
            return CycleOutcome::Skipped;
        }
        self.run_cycle().await
    }

    /// Takes the scene and carries out one turn.
    ///
    /// Any failure while the scene is held releases it.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _cycle = self.cycle.lock().await;

        let generation = match self.speaker.lock_scene() {
            Ok(generation) => generation,
            Err(e) => {
                debug!(error = %e, "scene was taken before the cycle started");
                return CycleOutcome::Skipped;
            }
        };
        self.speaker
            .unlock_scene_later_if_same_generation(self.config.scene_lock_timeout());

        match self.act(generation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(generation, error = %e, "turn failed while the scene was locked");
                if self.speaker.is_scene_locked() {
                    self.speaker.unlock_scene();
                }
                CycleOutcome::Failed
            }
        }
    }

    async fn act(&self, generation: u64) -> Result<CycleOutcome, ParleyError> {
        let player = self.directory.player_ref().await?;
        let target = self.directory.current_target();
        let hearing_npcs = self.directory.hearing_npcs(&player, target.as_ref()).await?;
        let context = SceneContext {
            player: player.clone(),
            target: target.clone(),
            hearing_npcs,
        };
        let pick = self.policy.pick_actor(&context).await?;

        if !self.speaker.is_scene_locked_at(generation) {
            debug!(generation, "scene was taken while picking the next actor");
            return Ok(CycleOutcome::Preempted);
        }

        let listeners = std::iter::once(player)
            .chain(context.hearing_npcs.iter().map(|n| n.actor_ref.clone()))
            .filter(|a| a != &pick.actor);
        for listener in listeners {
            self.turn_later(listener, pick.actor.clone());
        }

        if pick.actor.is_player() {
            if !self.player_acted_last.swap(true, Ordering::SeqCst) {
                info!("player is going to act this time");
            }
            if self.speaker.is_scene_locked_at(generation) {
                self.speaker.unlock_scene();
            }
            return Ok(CycleOutcome::ExternalTurn);
        }

        let npc = self.directory.npc(&pick.actor.ref_id).await?;
        self.player_acted_last.store(false, Ordering::SeqCst);

        if !self.speaker.is_scene_locked_at(generation) {
            debug!(generation, npc = %npc.actor_ref, "scene was taken while loading the npc");
            return Ok(CycleOutcome::Preempted);
        }

        if !self.speaker.set_scene_holder(generation, npc.actor_ref.clone())? {
            info!(npc = %npc.actor_ref, "npc was about to act but the scene was taken over");
        }
        info!(npc = %npc.actor_ref, reason = %pick.reason, "npc is going to act");

        let request = TurnRequest {
            other_hearing_npcs: context
                .hearing_npcs
                .iter()
                .filter(|n| n.actor_ref != npc.actor_ref)
                .cloned()
                .collect(),
            npc,
            target,
            reason: pick.reason,
        };
        let outcome = self.executor.act_out(&request).await?;
        let actor = &request.npc.actor_ref;

        if !self.speaker.is_scene_locked_by(actor) {
            info!(npc = %actor, "dropping npc turn, it no longer holds the scene");
            return Ok(CycleOutcome::Preempted);
        }

        for data in outcome.events {
            self.producer.produce_event(Event::new(data));
        }
        let mut spoke = false;
        for line in &outcome.lines {
            if !self.speaker.is_scene_locked_by(actor) {
                info!(npc = %actor, "npc lost the scene mid-turn");
                return Ok(CycleOutcome::Preempted);
            }
            spoke |= self
                .speaker
                .say(&request.npc, &line.text, line.target.as_ref())
                .await?
                .is_some();
        }

        // A silent turn has no line end to release the scene at.
        if !spoke && self.speaker.is_scene_locked_by(actor) {
            self.speaker.unlock_scene();
        }
        Ok(CycleOutcome::Acted)
    }

    fn turn_later(&self, actor: ActorRef, target: ActorRef) {
        let jitter_ms = {
            let max = u32::try_from(self.config.turn_jitter_max_ms).unwrap_or(u32::MAX);
            self.rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_u32_range(0, max)
        };
        let speaker = Arc::clone(&self.speaker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(u64::from(jitter_ms))).await;
            speaker.turn_actors_to(&[actor], &target);
        });
    }
}
