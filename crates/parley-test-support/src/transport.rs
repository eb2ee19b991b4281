//! Loopback transport: an in-memory `TransportBackend` for bus and RPC
//! tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::error::ParleyError;
use parley_core::event::Event;
use parley_core::transport::{InboundCallback, TransportBackend};

/// Produces an optional reply for every published event, emulating the game.
pub type Responder = Box<dyn Fn(&Event) -> Option<Event> + Send + Sync>;

/// Records published events and lets tests inject inbound ones.
pub struct LoopbackTransport {
    on_event: Mutex<Option<InboundCallback>>,
    published: Mutex<Vec<Event>>,
    connected: AtomicBool,
    responder: Option<Responder>,
}

impl LoopbackTransport {
    /// Creates a connected transport that never replies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_event: Mutex::new(None),
            published: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            responder: None,
        }
    }

    /// Creates a connected transport that answers published events with
    /// `responder`.
    #[must_use]
    pub fn with_responder(responder: Responder) -> Self {
        Self {
            responder: Some(responder),
            ..Self::new()
        }
    }

    /// Delivers `event` as if it came from the game. Returns `false` if the
    /// transport has not been started.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn inject(&self, event: Event) -> bool {
        let callback = self.on_event.lock().unwrap().clone();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Returns a snapshot of all published events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_events(&self) -> Vec<Event> {
        self.published.lock().unwrap().clone()
    }

    /// Sets the value reported by `is_connected`.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportBackend for LoopbackTransport {
    async fn start(&self, on_event: InboundCallback) -> Result<(), ParleyError> {
        *self.on_event.lock().unwrap() = Some(on_event);
        Ok(())
    }

    fn publish(&self, event: &Event) {
        self.published.lock().unwrap().push(event.clone());
        if let Some(reply) = self.responder.as_ref().and_then(|r| r(event)) {
            self.inject(reply);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
