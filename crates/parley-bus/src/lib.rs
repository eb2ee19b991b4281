//! In-process event bus and request/response correlation.
//!
//! The [`event_bus::EventBus`] wraps a transport backend with an outbound
//! and an inbound queue and fans every event out to registered handlers.
//! The [`rpc::Rpc`] correlator turns the one-way event stream into
//! awaitable calls.

pub mod event_bus;
pub mod rpc;
