//! The scene lock: a single floor token with a generation counter.
//!
//! The generation changes on every lock and every unlock. A caller captures
//! it when locking and compares it again before each side effect; a
//! mismatch means somebody else took the floor in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use parley_core::actor::ActorRef;
use parley_core::error::ParleyError;

/// Point-in-time view of the scene lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneLockSnapshot {
    /// Whether the scene is locked.
    pub locked: bool,
    /// Current generation.
    pub generation: u64,
    /// Who holds the floor, if anyone was assigned.
    pub holder: Option<ActorRef>,
}

#[derive(Debug)]
struct SceneLockState {
    is_locked: bool,
    generation: u64,
    holder: Option<ActorRef>,
}

impl SceneLockState {
    fn unlock(&mut self) {
        self.is_locked = false;
        self.holder = None;
        self.generation += 1;
    }
}

/// Shared handle to the scene lock. Clones refer to the same lock.
#[derive(Debug, Clone)]
pub struct SceneLock {
    state: Arc<Mutex<SceneLockState>>,
}

impl Default for SceneLock {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneLock {
    /// Creates an unlocked scene at generation 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SceneLockState {
                is_locked: false,
                generation: 1,
                holder: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SceneLockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the scene and returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::SceneAlreadyLocked`] if the scene is locked.
    pub fn lock(&self) -> Result<u64, ParleyError> {
        let mut state = self.state();
        if state.is_locked {
            error!(generation = state.generation, "trying to lock the scene while it is locked");
            return Err(ParleyError::SceneAlreadyLocked {
                generation: state.generation,
            });
        }
        state.is_locked = true;
        state.generation += 1;
        Ok(state.generation)
    }

    /// Assigns the holder if `generation` is still current.
    ///
    /// Returns `Ok(false)` and leaves the holder untouched when the
    /// generation is stale.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::HolderBeforeLock`] if the scene is unlocked.
    pub fn set_holder(&self, generation: u64, holder: ActorRef) -> Result<bool, ParleyError> {
        let mut state = self.state();
        if !state.is_locked {
            error!(holder = %holder, "trying to set the holder before locking the scene");
            return Err(ParleyError::HolderBeforeLock {
                holder: holder.ref_id,
            });
        }
        if state.generation != generation {
            return Ok(false);
        }
        state.holder = Some(holder);
        Ok(true)
    }

    /// Unlocks the scene unconditionally.
    pub fn unlock(&self) {
        self.state().unlock();
    }

    /// Unlocks the scene only if the generation is still `expected`.
    pub fn unlock_if_same_generation(&self, expected: u64) -> bool {
        let mut state = self.state();
        if state.generation != expected {
            return false;
        }
        state.unlock();
        true
    }

    /// Schedules an unlock after `delay` that only happens if the generation
    /// has not moved by then.
    pub fn unlock_later_if_same_generation(&self, delay: Duration) -> JoinHandle<()> {
        self.unlock_later_if_generation(self.generation(), delay)
    }

    /// Schedules an unlock after `delay` that only happens if the generation
    /// is still `expected` by then.
    pub fn unlock_later_if_generation(&self, expected: u64, delay: Duration) -> JoinHandle<()> {
        let lock = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if lock.unlock_if_same_generation(expected) {
                debug!(generation = expected, "scene lock timed out, unlocked");
            }
        })
    }

    /// Atomically unlocks the scene if needed, locks it again and hands it to
    /// `holder`. Returns the new generation.
    pub fn take_over(&self, holder: ActorRef) -> u64 {
        let mut state = self.state();
        if state.is_locked {
            state.unlock();
        }
        state.is_locked = true;
        state.generation += 1;
        state.holder = Some(holder);
        state.generation
    }

    /// Whether the scene is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().is_locked
    }

    /// Whether the scene is locked at exactly `generation`.
    #[must_use]
    pub fn is_locked_at(&self, generation: u64) -> bool {
        let state = self.state();
        state.is_locked && state.generation == generation
    }

    /// Whether the scene is locked and held by `actor`.
    #[must_use]
    pub fn is_locked_by(&self, actor: &ActorRef) -> bool {
        let state = self.state();
        state.is_locked && state.holder.as_ref() == Some(actor)
    }

    /// Current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Current holder.
    #[must_use]
    pub fn holder(&self) -> Option<ActorRef> {
        self.state().holder.clone()
    }

    /// Snapshot of the whole lock state.
    #[must_use]
    pub fn snapshot(&self) -> SceneLockSnapshot {
        let state = self.state();
        SceneLockSnapshot {
            locked: state.is_locked,
            generation: state.generation,
            holder: state.holder.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::actor::ActorKind;

    fn npc(ref_id: &str) -> ActorRef {
        ActorRef::new(ref_id, ActorKind::Npc, ref_id)
    }

    #[test]
    fn test_generation_increases_on_every_lock_and_unlock() {
        // Arrange
        let lock = SceneLock::new();
        let mut seen = vec![lock.generation()];

        // Act
        for _ in 0..3 {
            seen.push(lock.lock().unwrap());
            lock.unlock();
            seen.push(lock.generation());
        }

        // Assert
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_set_holder_does_not_change_generation() {
        // Arrange
        let lock = SceneLock::new();
        let generation = lock.lock().unwrap();

        // Act
        let accepted = lock.set_holder(generation, npc("guard")).unwrap();

        // Assert
        assert!(accepted);
        assert_eq!(lock.generation(), generation);
        assert!(lock.is_locked_by(&npc("guard")));
    }

    #[test]
    fn test_double_lock_fails() {
        // Arrange
        let lock = SceneLock::new();
        let generation = lock.lock().unwrap();

        // Act
        let result = lock.lock();

        // Assert
        assert!(matches!(
            result,
            Err(ParleyError::SceneAlreadyLocked { generation: g }) if g == generation
        ));
        assert!(lock.is_locked_at(generation));
    }

    #[test]
    fn test_stale_holder_is_rejected() {
        // Arrange
        let lock = SceneLock::new();
        let stale = lock.lock().unwrap();
        lock.unlock();
        let current = lock.lock().unwrap();
        lock.set_holder(current, npc("first")).unwrap();

        // Act
        let accepted = lock.set_holder(stale, npc("second")).unwrap();

        // Assert
        assert!(!accepted);
        assert_eq!(lock.holder(), Some(npc("first")));
    }

    #[test]
    fn test_holder_before_lock_fails() {
        // Arrange
        let lock = SceneLock::new();

        // Act
        let result = lock.set_holder(lock.generation(), npc("guard"));

        // Assert
        assert!(matches!(result, Err(ParleyError::HolderBeforeLock { .. })));
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn test_unlock_clears_holder() {
        // Arrange
        let lock = SceneLock::new();
        let generation = lock.lock().unwrap();
        lock.set_holder(generation, npc("guard")).unwrap();

        // Act
        lock.unlock();

        // Assert
        let snapshot = lock.snapshot();
        assert!(!snapshot.locked);
        assert_eq!(snapshot.holder, None);
        assert!(!lock.is_locked_by(&npc("guard")));
    }

    #[test]
    fn test_take_over_relocks_for_new_holder() {
        // Arrange
        let lock = SceneLock::new();
        let generation = lock.lock().unwrap();
        lock.set_holder(generation, npc("guard")).unwrap();
        let player = ActorRef::new("player", ActorKind::Player, "Nerevar");

        // Act
        let taken = lock.take_over(player.clone());

        // Assert
        assert_eq!(taken, generation + 2);
        assert!(lock.is_locked_by(&player));
        assert!(!lock.is_locked_at(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_unlock_fires_after_delay() {
        // Arrange
        let lock = SceneLock::new();
        let generation = lock.lock().unwrap();

        // Act
        let release = lock.unlock_later_if_same_generation(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(1999)).await;
        let locked_before = lock.is_locked_at(generation);
        release.await.unwrap();

        // Assert
        assert!(locked_before);
        assert!(!lock.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_unlock_is_noop_after_relock() {
        // Arrange
        let lock = SceneLock::new();
        lock.lock().unwrap();
        let release = lock.unlock_later_if_same_generation(Duration::from_secs(2));

        // Act
        lock.unlock();
        let relocked = lock.lock().unwrap();
        release.await.unwrap();

        // Assert
        assert!(lock.is_locked_at(relocked));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_scheduled_for_stale_generation_is_noop() {
        // Arrange
        let lock = SceneLock::new();
        let stale = lock.lock().unwrap();
        let current = lock.take_over(npc("guard"));

        // Act
        lock.unlock_later_if_generation(stale, Duration::from_secs(1))
            .await
            .unwrap();

        // Assert
        assert!(lock.is_locked_at(current));
        assert!(lock.is_locked_by(&npc("guard")));
    }
}
