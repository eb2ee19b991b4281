//! Scene services wired to the event bus.

pub mod coordinator;
pub mod directory;
pub mod npc_cache;
pub mod policies;
pub mod ports;
pub mod speaker;
