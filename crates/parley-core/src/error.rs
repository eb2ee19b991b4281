//! Shared error types.

use thiserror::Error;

use crate::event::EventId;

/// Top-level error type shared by the bus, RPC, and scene crates.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// No response arrived for an RPC request within the allowed time.
    #[error("rpc call timed out after {waited_ms} ms: {request_type} (event {event_id})")]
    RpcTimeout {
        /// Discriminator of the request.
        request_type: &'static str,
        /// Identifier assigned to the request.
        event_id: EventId,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// An RPC response arrived with the wrong discriminator.
    #[error("unexpected rpc response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        /// The discriminator the caller expected.
        expected: &'static str,
        /// The discriminator that arrived.
        actual: &'static str,
    },

    /// The scene was locked while already locked.
    #[error("scene is already locked at generation {generation}")]
    SceneAlreadyLocked {
        /// The generation of the existing lock.
        generation: u64,
    },

    /// A scene holder was assigned while the scene was not locked.
    #[error("scene holder {holder} assigned before locking the scene")]
    HolderBeforeLock {
        /// The actor that was about to be assigned.
        holder: String,
    },

    /// An external collaborator (policy, executor, voice) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// A bus handler failed while processing an event.
    #[error("handler error: {0}")]
    Handler(String),

    /// The transport could not be started or used.
    #[error("transport error: {0}")]
    Transport(String),
}
