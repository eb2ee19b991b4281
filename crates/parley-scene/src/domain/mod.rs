//! Scene domain: generation-counted locks and the actors they guard.

pub mod actor_lock;
pub mod actors;
pub mod scene_lock;
