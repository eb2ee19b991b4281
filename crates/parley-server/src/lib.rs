//! Parley scene server library: configuration, wiring, and the HTTP
//! status and control surface.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
