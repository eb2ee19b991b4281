//! Test handlers: `EventHandler` implementations for bus tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::bus::EventHandler;
use parley_core::error::ParleyError;
use parley_core::event::Event;

/// Records every event it is given.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    /// Creates an empty recording handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events seen so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seen_events(&self) -> Vec<Event> {
        self.seen.lock().unwrap().clone()
    }

    /// Waits until at least `count` events were seen or `timeout` elapses,
    /// returning the snapshot either way.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Event> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let seen = self.seen_events();
            if seen.len() >= count || tokio::time::Instant::now() >= deadline {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fails on every event.
#[derive(Debug)]
pub struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn handle(&self, _event: &Event) -> Result<(), ParleyError> {
        Err(ParleyError::Handler("handler refused the event".into()))
    }
}

/// Panics on every event.
#[derive(Debug)]
pub struct PanickingHandler;

#[async_trait]
impl EventHandler for PanickingHandler {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn handle(&self, event: &Event) -> Result<(), ParleyError> {
        panic!("handler panicked on event {}", event.event_id);
    }
}
