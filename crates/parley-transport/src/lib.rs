//! Parley Transport: the framed duplex connection to the game process.
//!
//! Frames are a 4-byte big-endian length followed by a UTF-8 JSON event.

pub mod codec;
pub mod tcp_transport;
