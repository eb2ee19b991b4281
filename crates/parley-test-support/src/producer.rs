//! Recording producer: an `EventProducer` that keeps what it was given.

use std::sync::Mutex;

use parley_core::bus::EventProducer;
use parley_core::event::{Event, EventId};

/// Assigns sequential identifiers starting at 1 and records every event.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    produced: Mutex<Vec<Event>>,
}

impl RecordingProducer {
    /// Creates an empty producer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all produced events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn produced_events(&self) -> Vec<Event> {
        self.produced.lock().unwrap().clone()
    }

    /// Returns the discriminators of all produced events, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn produced_types(&self) -> Vec<&'static str> {
        self.produced
            .lock()
            .unwrap()
            .iter()
            .map(Event::event_type)
            .collect()
    }
}

impl EventProducer for RecordingProducer {
    fn produce_event(&self, mut event: Event) -> EventId {
        let mut produced = self.produced.lock().unwrap();
        #[allow(clippy::cast_possible_wrap)]
        let id = produced.len() as EventId + 1;
        event.event_id = id;
        produced.push(event);
        id
    }
}
