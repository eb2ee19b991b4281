//! Transport backend abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::event::Event;

/// Callback invoked by a transport for every event decoded from the peer.
pub type InboundCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Owns the duplex connection to the game process.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    /// Starts serving the peer. Every decoded inbound event is passed to
    /// `on_event`. Returns once the transport is ready to accept a peer.
    async fn start(&self, on_event: InboundCallback) -> Result<(), ParleyError>;

    /// Sends an event to the connected peer, best effort. Failures are
    /// logged by the transport, never returned.
    fn publish(&self, event: &Event);

    /// Returns `true` while a peer is connected.
    fn is_connected(&self) -> bool;
}
