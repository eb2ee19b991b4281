//! Per-actor locks that keep an actor from speaking twice at once.
//!
//! Acquiring waits until the actor is free. Every acquisition schedules its
//! own release after the expected action duration; the release only takes
//! effect if nobody released and re-acquired in between.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use parley_core::actor::ActorRef;

#[derive(Debug)]
struct ActorLockState {
    guard: Option<OwnedMutexGuard<()>>,
    generation: u64,
}

impl ActorLockState {
    fn release(&mut self) -> bool {
        if self.guard.take().is_none() {
            return false;
        }
        self.generation += 1;
        true
    }
}

/// A lock owned by one actor. Clones refer to the same lock.
#[derive(Debug, Clone)]
pub struct ActorLock {
    actor: ActorRef,
    mutex: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<ActorLockState>>,
}

impl ActorLock {
    /// Creates a free lock for `actor`.
    #[must_use]
    pub fn new(actor: ActorRef) -> Self {
        Self {
            actor,
            mutex: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(ActorLockState {
                guard: None,
                generation: 1,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ActorLockState> {
        lock_state(&self.state)
    }

    /// Waits until the actor is free, takes the lock and schedules its
    /// release after `hold_for`. Returns the generation of this hold.
    pub async fn acquire(&self, hold_for: Duration) -> u64 {
        debug!(actor = %self.actor, "acquiring actor lock");
        let guard = Arc::clone(&self.mutex).lock_owned().await;
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.guard = Some(guard);
            state.generation
        };
        debug!(actor = %self.actor, generation, "actor lock acquired");

        let state = Arc::clone(&self.state);
        let actor = self.actor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(hold_for).await;
            let mut state = lock_state(&state);
            if state.generation == generation && state.release() {
                debug!(actor = %actor, generation, "actor lock timed out, released");
            }
        });

        generation
    }

    /// Releases the lock. Returns `false` if it was not held.
    pub fn release(&self) -> bool {
        let released = self.state().release();
        if released {
            debug!(actor = %self.actor, "actor lock released");
        }
        released
    }

    /// Whether the lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().guard.is_some()
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// The actor this lock belongs to.
    #[must_use]
    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }
}

fn lock_state(state: &Mutex<ActorLockState>) -> MutexGuard<'_, ActorLockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lazily created actor locks, one per actor that ever spoke.
#[derive(Debug, Default)]
pub struct ActorLockRegistry {
    locks: Mutex<HashMap<ActorRef, ActorLock>>,
}

impl ActorLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock of `actor`, creating it on first use.
    pub fn get(&self, actor: &ActorRef) -> ActorLock {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(actor.clone())
            .or_insert_with(|| ActorLock::new(actor.clone()))
            .clone()
    }

    /// Every lock created so far.
    pub fn all(&self) -> Vec<ActorLock> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
