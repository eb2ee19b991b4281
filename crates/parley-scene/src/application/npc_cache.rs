//! In-memory NPC cache backed by RPC lookups.
//!
//! Lookups of the same NPC are serialized so the game is asked at most once
//! per reference at a time. Entries go stale after a fixed time and are
//! fetched again on the next access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use parley_bus::rpc::Rpc;
use parley_core::bus::EventHandler;
use parley_core::clock::Clock;
use parley_core::error::ParleyError;
use parley_core::event::{Event, EventData};

use crate::domain::actors::Npc;

#[derive(Debug)]
struct CachedNpc {
    npc: Npc,
    expires_at: DateTime<Utc>,
}

/// NPC cache.
pub struct NpcCache {
    rpc: Arc<Rpc>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    entries: Mutex<HashMap<String, CachedNpc>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NpcCache {
    /// Creates an empty cache whose entries stay fresh for `ttl_ms`.
    #[must_use]
    pub fn new(rpc: Arc<Rpc>, clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            rpc,
            clock,
            ttl: chrono::Duration::milliseconds(i64::try_from(ttl_ms).unwrap_or(i64::MAX)),
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedNpc>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flight(&self, ref_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(in_flight.entry(ref_id.to_owned()).or_default())
    }

    /// Returns the NPC, asking the game when it is unknown or stale.
    ///
    /// # Errors
    ///
    /// Returns the RPC error if the game has to be asked and does not answer.
    pub async fn get(&self, ref_id: &str) -> Result<Npc, ParleyError> {
        let flight = self.flight(ref_id);
        let _serialized = flight.lock().await;

        let now = self.clock.now();
        let fresh = self
            .entries()
            .get(ref_id)
            .filter(|cached| now <= cached.expires_at)
            .map(|cached| cached.npc.clone());
        if let Some(npc) = fresh {
            return Ok(npc);
        }

        debug!(npc = ref_id, "fetching npc from the game");
        let npc = Npc::from_data(self.rpc.get_npc_data(ref_id).await?);
        self.entries().insert(
            ref_id.to_owned(),
            CachedNpc {
                npc: npc.clone(),
                expires_at: self.clock.now() + self.ttl,
            },
        );
        Ok(npc)
    }

    /// Marks a cached NPC as dead.
    pub fn mark_dead(&self, ref_id: &str) {
        if let Some(cached) = self.entries().get_mut(ref_id) {
            cached.npc.data.is_dead = true;
        }
    }

    /// Drops every cached NPC and the lookup slots nobody is waiting on.
    pub fn clear(&self) {
        self.entries().clear();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, flight| Arc::strong_count(flight) > 1);
        debug!("npc cache cleared");
    }

    /// Number of lookup slots currently tracked.
    #[must_use]
    pub fn lookup_slots(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of cached NPCs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
impl EventHandler for NpcCache {
    fn name(&self) -> &'static str {
        "npc_cache"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        if let EventData::NpcDeath { actor, .. } = &event.data {
            self.mark_dead(&actor.ref_id);
        }
        Ok(())
    }
}
