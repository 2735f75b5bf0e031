#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if)]

//! Shared wire types, transport, and game-state primitives used by both
//! the server and client binaries: nothing in here owns a socket.

pub mod collision;
pub mod config;
pub mod console;
pub mod error;
pub mod input;
pub mod leaderboard;
pub mod net_addr;
pub mod net_queue;
pub mod snapshot;
pub mod srt;
pub mod time;
pub mod wire;
pub mod world;
