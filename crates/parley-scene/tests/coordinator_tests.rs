//! Integration tests for the turn coordinator.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{
    FailingExecutor, FakeDirectory, FixedVoice, GatedPolicy, ScriptedExecutor, ScriptedPolicy,
    npc_at, player_ref,
};
use parley_core::actor::ActorRef;
use parley_core::bus::EventHandler;
use parley_core::event::{Event, EventData};
use parley_scene::application::coordinator::{CycleOutcome, TurnCoordinator};
use parley_scene::application::ports::{ActorPolicy, SpokenLine, TurnExecutor, TurnOutcome};
use parley_scene::application::speaker::SceneSpeaker;
use parley_scene::config::SceneConfig;
use parley_scene::domain::actors::Npc;
use parley_test_support::{ManualClock, RecordingProducer, SequenceRng};
use tokio::sync::Notify;

struct Fixture {
    coordinator: Arc<TurnCoordinator>,
    speaker: Arc<SceneSpeaker>,
    directory: Arc<FakeDirectory>,
    producer: Arc<RecordingProducer>,
    clock: Arc<ManualClock>,
}

fn fixture(npcs: Vec<Npc>, picks: Vec<ActorRef>, executor: Arc<dyn TurnExecutor>) -> Fixture {
    fixture_with_policy(npcs, Arc::new(ScriptedPolicy::new(picks)), executor)
}

fn fixture_with_policy(
    npcs: Vec<Npc>,
    policy: Arc<dyn ActorPolicy>,
    executor: Arc<dyn TurnExecutor>,
) -> Fixture {
    let config = SceneConfig::default();
    let producer = Arc::new(RecordingProducer::new());
    let directory = Arc::new(FakeDirectory::with_npcs(npcs));
    let speaker = Arc::new(SceneSpeaker::new(
        &config,
        producer.clone(),
        directory.clone(),
        Arc::new(FixedVoice::new(Duration::from_secs(8))),
    ));
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    ));
    let coordinator = Arc::new(TurnCoordinator::new(
        config,
        speaker.clone(),
        directory.clone(),
        policy,
        executor,
        producer.clone(),
        clock.clone(),
        Box::new(SequenceRng::new(vec![1500, 250])),
    ));
    Fixture {
        coordinator,
        speaker,
        directory,
        producer,
        clock,
    }
}

fn one_line(text: &str) -> TurnOutcome {
    TurnOutcome {
        lines: vec![SpokenLine {
            text: text.to_owned(),
            target: Some(player_ref()),
        }],
        events: Vec::new(),
    }
}

fn turn_events(producer: &RecordingProducer) -> Vec<(Vec<String>, String)> {
    producer
        .produced_events()
        .into_iter()
        .filter_map(|e| match e.data {
            EventData::TurnActorsTo {
                actor_ref_ids,
                target_ref_id,
            } => Some((actor_ref_ids, target_ref_id)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_external_party_turn_releases_scene_before_next_tick() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let f = fixture(
        vec![guard],
        vec![player_ref()],
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::ExternalTurn);
    assert!(!f.speaker.is_scene_locked());
    assert_eq!(f.speaker.scene_snapshot().generation, 3);
}

#[tokio::test(start_paused = true)]
async fn test_listeners_turn_to_the_actor_after_jitter() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let fargoth = npc_at("fargoth", 4.0);
    let f = fixture(
        vec![guard.clone(), fargoth],
        vec![guard.actor_ref.clone()],
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );

    // Act
    f.coordinator.tick().await;
    let before_jitter = turn_events(&f.producer);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let after_short = turn_events(&f.producer);
    tokio::time::sleep(Duration::from_secs(2)).await;
    let after_all = turn_events(&f.producer);

    // Assert
    assert!(before_jitter.is_empty());
    assert_eq!(
        after_short,
        vec![(vec!["fargoth".to_owned()], "guard".to_owned())]
    );
    assert_eq!(after_all.len(), 2);
    assert!(after_all.contains(&(vec!["player".to_owned()], "guard".to_owned())));
}

#[tokio::test(start_paused = true)]
async fn test_npc_turn_is_voiced_while_holding_the_scene() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let executor = Arc::new(ScriptedExecutor::new(TurnOutcome {
        lines: one_line("Halt!").lines,
        events: vec![EventData::NpcStopCombat {
            npc_ref_id: "guard".to_owned(),
        }],
    }));
    let f = fixture(vec![guard.clone()], vec![guard.actor_ref.clone()], executor.clone());

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Acted);
    assert!(f.speaker.is_scene_locked_by(&guard.actor_ref));
    let types = f.producer.produced_types();
    assert!(types.contains(&"npc_stop_combat"));
    assert!(types.contains(&"npc_say_mp3"));
    let request = executor.requests.lock().unwrap()[0].clone();
    assert_eq!(request.npc.actor_ref, guard.actor_ref);
    assert!(request.other_hearing_npcs.is_empty());
    assert_eq!(request.reason, "scripted");
}

#[tokio::test(start_paused = true)]
async fn test_silent_turn_releases_the_scene() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let f = fixture(
        vec![guard.clone()],
        vec![guard.actor_ref.clone()],
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Acted);
    assert!(!f.speaker.is_scene_locked());
}

#[tokio::test(start_paused = true)]
async fn test_player_interruption_preempts_npc_turn() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let gate = Arc::new(Notify::new());
    let executor = Arc::new(ScriptedExecutor::gated(one_line("Halt!"), gate.clone()));
    let f = fixture(vec![guard.clone()], vec![guard.actor_ref.clone()], executor.clone());
    let cycle = {
        let coordinator = Arc::clone(&f.coordinator);
        tokio::spawn(async move { coordinator.tick().await })
    };
    executor.started.notified().await;

    // Act
    f.speaker
        .handle(&Event::new(EventData::SttRecognitionUpdate {
            text: "wait".to_owned(),
        }))
        .await
        .unwrap();
    gate.notify_one();
    let outcome = cycle.await.unwrap();

    // Assert
    assert_eq!(outcome, CycleOutcome::Preempted);
    assert!(f.speaker.is_scene_locked_by(&player_ref()));
    assert!(!f.producer.produced_types().contains(&"npc_say_mp3"));
}

#[tokio::test(start_paused = true)]
async fn test_player_taking_the_scene_while_picking_aborts_the_turn() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let gate = Arc::new(Notify::new());
    let policy = Arc::new(GatedPolicy::new(guard.actor_ref.clone(), gate.clone()));
    let executor = Arc::new(ScriptedExecutor::new(one_line("Halt!")));
    let f = fixture_with_policy(vec![guard.clone()], policy.clone(), executor.clone());
    let cycle = {
        let coordinator = Arc::clone(&f.coordinator);
        tokio::spawn(async move { coordinator.tick().await })
    };
    policy.started.notified().await;

    // Act
    f.speaker
        .handle(&Event::new(EventData::SttRecognitionUpdate {
            text: "wait".to_owned(),
        }))
        .await
        .unwrap();
    gate.notify_one();
    let outcome = cycle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Preempted);
    assert!(f.speaker.is_scene_locked_by(&player_ref()));
    assert!(executor.requests.lock().unwrap().is_empty());
    assert!(turn_events(&f.producer).is_empty());
    assert!(!f.producer.produced_types().contains(&"npc_say_mp3"));
}

#[tokio::test(start_paused = true)]
async fn test_relock_while_picking_aborts_the_turn_without_a_holder() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let gate = Arc::new(Notify::new());
    let policy = Arc::new(GatedPolicy::new(guard.actor_ref.clone(), gate.clone()));
    let executor = Arc::new(ScriptedExecutor::new(one_line("Halt!")));
    let f = fixture_with_policy(vec![guard.clone()], policy.clone(), executor.clone());
    let cycle = {
        let coordinator = Arc::clone(&f.coordinator);
        tokio::spawn(async move { coordinator.run_cycle().await })
    };
    policy.started.notified().await;

    // Act
    f.speaker.unlock_scene();
    let relocked = f.speaker.lock_scene().unwrap();
    gate.notify_one();
    let outcome = cycle.await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Preempted);
    assert!(f.speaker.is_scene_locked_at(relocked));
    assert!(f.speaker.scene_snapshot().holder.is_none());
    assert!(executor.requests.lock().unwrap().is_empty());
    assert!(turn_events(&f.producer).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_turn_fault_unlocks_the_scene() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let f = fixture(
        vec![guard.clone()],
        vec![guard.actor_ref.clone()],
        Arc::new(FailingExecutor),
    );

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Failed);
    assert!(!f.speaker.is_scene_locked());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_actor_fails_the_cycle() {
    // Arrange
    let stranger = npc_at("stranger", 2.0).actor_ref;
    let f = fixture(
        Vec::new(),
        vec![stranger],
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Failed);
    assert!(!f.speaker.is_scene_locked());
}

#[tokio::test(start_paused = true)]
async fn test_wedged_turn_is_released_by_safety_timeout() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let gate = Arc::new(Notify::new());
    let executor = Arc::new(ScriptedExecutor::gated(one_line("Halt!"), gate.clone()));
    let f = fixture(vec![guard.clone()], vec![guard.actor_ref.clone()], executor.clone());
    let cycle = {
        let coordinator = Arc::clone(&f.coordinator);
        tokio::spawn(async move { coordinator.run_cycle().await })
    };
    executor.started.notified().await;

    // Act
    tokio::time::sleep(Duration::from_secs(91)).await;
    let unlocked = !f.speaker.is_scene_locked();
    gate.notify_one();
    let outcome = cycle.await.unwrap();

    // Assert
    assert!(unlocked);
    assert_eq!(outcome, CycleOutcome::Preempted);
}

#[tokio::test(start_paused = true)]
async fn test_tick_is_skipped_while_scene_is_locked() {
    // Arrange
    let f = fixture(
        Vec::new(),
        Vec::new(),
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );
    let generation = f.speaker.lock_scene().unwrap();

    // Act
    let outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(outcome, CycleOutcome::Skipped);
    assert!(f.speaker.is_scene_locked_at(generation));
}

#[tokio::test(start_paused = true)]
async fn test_pause_skips_ticks_and_resume_clears_cache() {
    // Arrange
    let f = fixture(
        Vec::new(),
        Vec::new(),
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );
    f.speaker
        .handle(&Event::new(EventData::NpcDeath {
            actor: npc_at("guard", 2.0).actor_ref,
            killer: None,
        }))
        .await
        .unwrap();

    // Act
    f.coordinator.pause();
    let paused_outcome = f.coordinator.tick().await;
    let deaths_while_paused = f.speaker.known_deaths();
    f.coordinator.resume();
    let resumed_outcome = f.coordinator.tick().await;

    // Assert
    assert_eq!(paused_outcome, CycleOutcome::Skipped);
    assert_eq!(resumed_outcome, CycleOutcome::ExternalTurn);
    assert!(!f.coordinator.is_paused());
    assert_eq!(f.directory.cache_clears.load(Ordering::SeqCst), 1);
    assert_eq!(deaths_while_paused, 1);
    assert_eq!(f.speaker.known_deaths(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shut_up_holds_back_ticks_for_the_window() {
    // Arrange
    let f = fixture(
        Vec::new(),
        Vec::new(),
        Arc::new(ScriptedExecutor::new(TurnOutcome::default())),
    );

    // Act
    f.coordinator.shut_up().await;
    let inside = f.coordinator.tick().await;
    f.clock.advance(chrono::Duration::milliseconds(5001));
    let after = f.coordinator.tick().await;

    // Assert
    assert_eq!(inside, CycleOutcome::Skipped);
    assert_eq!(after, CycleOutcome::ExternalTurn);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_loop_runs_cycles_on_every_tick() {
    // Arrange
    let guard = npc_at("guard", 2.0);
    let executor = Arc::new(ScriptedExecutor::new(TurnOutcome::default()));
    let f = fixture(
        vec![guard.clone()],
        vec![guard.actor_ref.clone(), guard.actor_ref.clone()],
        executor.clone(),
    );

    // Act
    let handle = Arc::clone(&f.coordinator).spawn();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.abort();

    // Assert
    assert_eq!(executor.requests.lock().unwrap().len(), 2);
}
