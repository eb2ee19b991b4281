//! Parley scene subsystem.
//!
//! Decides who holds the floor in a conversation scene between the player
//! and nearby NPCs, and carries an NPC's turn out while it still does.

pub mod application;
pub mod config;
pub mod domain;
