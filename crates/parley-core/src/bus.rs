//! Event bus seams: producing, consuming, and handling events.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::event::{Event, EventId};

/// An async handler invoked for every event the bus processes, inbound and
/// outbound alike.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Handles one event. An error is logged by the bus and does not stop
    /// other handlers from seeing the event.
    async fn handle(&self, event: &Event) -> Result<(), ParleyError>;
}

/// Enqueues events for delivery to the game.
pub trait EventProducer: Send + Sync {
    /// Enqueues `event` and returns the identifier assigned to it.
    fn produce_event(&self, event: Event) -> EventId;
}

/// Registers handlers for events passing through the bus.
pub trait EventConsumer: Send + Sync {
    /// Adds `handler` to the end of the handler list.
    fn register_handler(&self, handler: Arc<dyn EventHandler>);
}
