//! Parley Core: shared event model and seam traits.
//!
//! This crate defines the wire event model exchanged with the game process
//! and the traits that the transport, bus, and scene crates meet at. It
//! contains no infrastructure code.

pub mod actor;
pub mod bus;
pub mod clock;
pub mod data;
pub mod error;
pub mod event;
pub mod rng;
pub mod transport;
