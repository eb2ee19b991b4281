//! Request/response correlation over the event bus.
//!
//! A call enqueues a request, remembers the identifier the bus assigned to
//! it, and waits until an event answering that identifier shows up or the
//! wait limit is reached. The correlator is itself a bus handler: it looks
//! at `response_to_event_id` on every event.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, instrument};

use parley_core::bus::{EventHandler, EventProducer};
use parley_core::data::{ActorNearby, EnvData, NpcData, PlayerData};
use parley_core::error::ParleyError;
use parley_core::event::{Event, EventData, EventId};

/// RPC configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// How long a call waits for its response.
    pub max_wait_time_ms: u64,
    /// Longest interval between two checks of the resolved table.
    pub poll_interval_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_wait_time_ms: 5000,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Default)]
struct PendingCalls {
    awaiting: HashSet<EventId>,
    resolved: HashMap<EventId, Event>,
}

/// The RPC correlator.
pub struct Rpc {
    config: RpcConfig,
    producer: Arc<dyn EventProducer>,
    pending: Mutex<PendingCalls>,
    arrived: Notify,
}

impl Rpc {
    /// Creates a correlator producing requests through `producer`.
    ///
    /// The returned value must also be registered as a handler on the bus
    /// that delivers the responses.
    #[must_use]
    pub fn new(config: RpcConfig, producer: Arc<dyn EventProducer>) -> Self {
        Self {
            config,
            producer,
            pending: Mutex::new(PendingCalls::default()),
            arrived: Notify::new(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingCalls> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of calls still waiting for their response.
    #[must_use]
    pub fn awaiting_count(&self) -> usize {
        self.pending().awaiting.len()
    }

    /// Number of responses that arrived but were not collected yet.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.pending().resolved.len()
    }

    /// Sends `request` and waits for the event that answers it.
    ///
    /// The call is a single attempt; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::RpcTimeout`] if no response arrives within the
    /// configured wait time.
    pub async fn call(&self, request: EventData) -> Result<Event, ParleyError> {
        self.call_with_timeout(request, Duration::from_millis(self.config.max_wait_time_ms))
            .await
    }

    /// Like [`call`](Rpc::call), with an explicit wait limit.
    ///
    /// # Errors
    ///
    /// Returns [`ParleyError::RpcTimeout`] if no response arrives within
    /// `max_wait`.
    #[instrument(skip(self, request), fields(request_type = request.event_type()))]
    pub async fn call_with_timeout(
        &self,
        request: EventData,
        max_wait: Duration,
    ) -> Result<Event, ParleyError> {
        let request_type = request.event_type();
        let started = Instant::now();
        let event_id = {
            let mut pending = self.pending();
            let event_id = self.producer.produce_event(Event::new(request));
            pending.awaiting.insert(event_id);
            event_id
        };
        debug!(event_id, "rpc request sent");

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            {
                let mut pending = self.pending();
                if let Some(response) = pending.resolved.remove(&event_id) {
                    debug!(event_id, response_type = response.event_type(), "rpc response received");
                    return Ok(response);
                }
                let elapsed = started.elapsed();
                if elapsed >= max_wait {
                    pending.awaiting.remove(&event_id);
                    return Err(ParleyError::RpcTimeout {
                        request_type,
                        event_id,
                        waited_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }

            let remaining = max_wait.saturating_sub(started.elapsed());
            let _ = tokio::time::timeout(poll_interval.min(remaining), self.arrived.notified()).await;
        }
    }

    /// Fetches the state of an NPC.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the game answers with another event.
    pub async fn get_npc_data(&self, npc_ref_id: &str) -> Result<NpcData, ParleyError> {
        let response = self
            .call(EventData::GetNpcRequest {
                npc_ref_id: npc_ref_id.to_owned(),
            })
            .await?;
        match response.data {
            EventData::GetNpcResponse { npc_data } => Ok(npc_data),
            other => Err(unexpected("get_npc_response", &other)),
        }
    }

    /// Fetches the world environment.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the game answers with another event.
    pub async fn get_env(&self) -> Result<EnvData, ParleyError> {
        let response = self.call(EventData::GetEnvRequest).await?;
        match response.data {
            EventData::GetEnvResponse { env_data } => Ok(env_data),
            other => Err(unexpected("get_env_response", &other)),
        }
    }

    /// Fetches the local player.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the game answers with another event.
    pub async fn get_local_player(&self) -> Result<PlayerData, ParleyError> {
        let response = self.call(EventData::GetLocalPlayerRequest).await?;
        match response.data {
            EventData::GetLocalPlayerResponse { player_data } => Ok(player_data),
            other => Err(unexpected("get_local_player_response", &other)),
        }
    }

    /// Lists actors around `actor_ref_id`, or around the player when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the game answers with another event.
    pub async fn get_actors_nearby(
        &self,
        actor_ref_id: Option<&str>,
        radius_ingame: Option<f64>,
        test_line_of_sight: bool,
    ) -> Result<Vec<ActorNearby>, ParleyError> {
        let response = self
            .call(EventData::GetActorsNearbyRequest {
                actor_ref_id: actor_ref_id.map(str::to_owned),
                radius_ingame,
                test_line_of_sight: Some(test_line_of_sight),
            })
            .await?;
        match response.data {
            EventData::GetActorsNearbyResponse { actors } => Ok(actors),
            other => Err(unexpected("get_actors_nearby_response", &other)),
        }
    }

    /// Asks whether `ref_id` still exists in the game.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or if the game answers with another event.
    pub async fn is_ref_valid(&self, ref_id: &str) -> Result<bool, ParleyError> {
        let response = self
            .call(EventData::IsRefValidRequest {
                ref_id: ref_id.to_owned(),
            })
            .await?;
        match response.data {
            EventData::IsRefValidResponse { is_valid } => Ok(is_valid),
            other => Err(unexpected("is_ref_valid_response", &other)),
        }
    }
}

fn unexpected(expected: &'static str, actual: &EventData) -> ParleyError {
    ParleyError::UnexpectedResponse {
        expected,
        actual: actual.event_type(),
    }
}

#[async_trait]
impl EventHandler for Rpc {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        let Some(request_id) = event.response_to_event_id else {
            return Ok(());
        };

        let matched = {
            let mut pending = self.pending();
            if pending.awaiting.remove(&request_id) {
                pending.resolved.insert(request_id, event.clone());
                true
            } else {
                false
            }
        };

        if matched {
            self.arrived.notify_waiters();
        } else {
            error!(
                event_id = event.event_id,
                response_to = request_id,
                event_type = event.event_type(),
                "unexpected response, no call is waiting for it"
            );
        }
        Ok(())
    }
}
