//! Scene timing and distance settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scene configuration. All durations are in milliseconds, all distances in
/// meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Interval between two coordinator ticks.
    pub tick_interval_ms: u64,
    /// How long before the end of a voiced line the scene is released.
    pub release_before_end_ms: u64,
    /// Upper bound on how long a single cycle may hold the scene.
    pub scene_lock_timeout_ms: u64,
    /// Ticks are skipped for this long after a shut-up command.
    pub shut_up_window_ms: u64,
    /// Upper bound of the random delay before a listener turns to the actor.
    pub turn_jitter_max_ms: u64,
    /// How long NPC data fetched from the game stays fresh.
    pub npc_cache_ttl_ms: u64,
    /// Radius within which NPCs can hear the player.
    pub hearing_radius_m: f64,
    /// NPCs this close hear the player even without line of sight.
    pub close_hearing_radius_m: f64,
    /// Silenced NPCs farther than this keep their sound playing.
    pub silence_radius_m: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            release_before_end_ms: 4000,
            scene_lock_timeout_ms: 90_000,
            shut_up_window_ms: 5000,
            turn_jitter_max_ms: 2000,
            npc_cache_ttl_ms: 30_000,
            hearing_radius_m: 50.0,
            close_hearing_radius_m: 3.0,
            silence_radius_m: 20.0,
        }
    }
}

impl SceneConfig {
    /// Interval between two coordinator ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Lead time subtracted from a voiced line before releasing the scene.
    #[must_use]
    pub fn release_before_end(&self) -> Duration {
        Duration::from_millis(self.release_before_end_ms)
    }

    /// Safety timeout for a held scene.
    #[must_use]
    pub fn scene_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.scene_lock_timeout_ms)
    }
}
