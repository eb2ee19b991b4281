//! Two-queue event bus.
//!
//! Outbound events are numbered on enqueue, published through the transport
//! backend, then handed to every registered handler. Inbound events from the
//! game are only handed to the handlers. Each direction is FIFO; nothing is
//! promised across directions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use parley_core::bus::{EventConsumer, EventHandler, EventProducer};
use parley_core::error::ParleyError;
use parley_core::event::{Event, EventId};
use parley_core::transport::{InboundCallback, TransportBackend};

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Number of workers draining the outbound queue.
    pub producers: usize,
    /// Number of workers draining the inbound queue.
    pub consumers: usize,
    /// Longest time an idle worker waits before re-checking its queue.
    pub idle_poll_ms: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            idle_poll_ms: 33,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => f.write_str("outbound"),
            Self::Inbound => f.write_str("inbound"),
        }
    }
}

struct QueueState {
    items: VecDeque<Event>,
    next_event_id: EventId,
}

struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl EventQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                next_event_id: 1,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: Event) {
        self.lock().items.push_back(event);
        self.notify.notify_one();
    }

    fn push_numbered(&self, mut event: Event) -> EventId {
        let event_id = {
            let mut state = self.lock();
            let event_id = state.next_event_id;
            state.next_event_id += 1;
            event.event_id = event_id;
            state.items.push_back(event);
            event_id
        };
        self.notify.notify_one();
        event_id
    }

    fn pop(&self) -> Option<Event> {
        self.lock().items.pop_front()
    }
}

struct Inner {
    config: EventBusConfig,
    backend: Arc<dyn TransportBackend>,
    outbound: EventQueue,
    inbound: EventQueue,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn queue(&self, direction: Direction) -> &EventQueue {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    fn handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn process(&self, direction: Direction, event: Event) {
        debug!(
            direction = %direction,
            event_id = event.event_id,
            response_to = ?event.response_to_event_id,
            event_type = event.event_type(),
            "processing event"
        );

        if direction == Direction::Outbound {
            self.backend.publish(&event);
        }

        let event = Arc::new(event);
        for handler in self.handlers() {
            let name = handler.name();
            let task_event = Arc::clone(&event);
            let outcome = tokio::spawn(async move { handler.handle(&task_event).await }).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        handler = name,
                        event_id = event.event_id,
                        event_type = event.event_type(),
                        error = %e,
                        "event handler failed"
                    );
                }
                Err(e) => {
                    error!(
                        handler = name,
                        event_id = event.event_id,
                        event_type = event.event_type(),
                        error = %e,
                        "event handler panicked"
                    );
                }
            }
        }
    }
}

async fn run_worker(inner: Arc<Inner>, direction: Direction, worker: usize) {
    let idle_poll = Duration::from_millis(inner.config.idle_poll_ms);
    debug!(direction = %direction, worker, "bus worker started");
    loop {
        let queue = inner.queue(direction);
        if let Some(event) = queue.pop() {
            inner.process(direction, event).await;
        } else {
            let _ = tokio::time::timeout(idle_poll, queue.notify.notified()).await;
        }
    }
}

/// The event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    /// Creates a bus on top of `backend`. Nothing runs until [`start`].
    ///
    /// [`start`]: EventBus::start
    #[must_use]
    pub fn new(config: EventBusConfig, backend: Arc<dyn TransportBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                outbound: EventQueue::new(),
                inbound: EventQueue::new(),
                handlers: RwLock::new(Vec::new()),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Starts the backend and the queue workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport backend fails to start.
    pub async fn start(&self) -> Result<(), ParleyError> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let on_event: InboundCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.inbound.push(event);
            }
        });
        self.inner.backend.start(on_event).await?;

        let mut workers = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for worker in 0..self.inner.config.producers.max(1) {
            let inner = Arc::clone(&self.inner);
            workers.push(tokio::spawn(run_worker(inner, Direction::Outbound, worker)));
        }
        for worker in 0..self.inner.config.consumers.max(1) {
            let inner = Arc::clone(&self.inner);
            workers.push(tokio::spawn(run_worker(inner, Direction::Inbound, worker)));
        }
        Ok(())
    }

    /// Stops the queue workers. Events still queued are dropped.
    pub fn shutdown(&self) {
        let workers = std::mem::take(
            &mut *self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            worker.abort();
        }
    }

    /// Returns `true` while the game is connected to the backend.
    #[must_use]
    pub fn is_connected_to_game(&self) -> bool {
        self.inner.backend.is_connected()
    }
}

impl EventProducer for EventBus {
    fn produce_event(&self, event: Event) -> EventId {
        self.inner.outbound.push_numbered(event)
    }
}

impl EventConsumer for EventBus {
    fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        debug!(handler = handler.name(), "registering event handler");
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}
