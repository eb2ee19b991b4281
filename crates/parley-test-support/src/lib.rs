//! Shared test mocks and utilities for the Parley scene server.

mod clock;
mod handler;
mod producer;
mod rng;
mod transport;

pub use clock::{FixedClock, ManualClock};
pub use handler::{FailingHandler, PanickingHandler, RecordingHandler};
pub use producer::RecordingProducer;
pub use rng::SequenceRng;
pub use transport::{LoopbackTransport, Responder};
