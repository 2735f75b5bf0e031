//! Authoritative server: session/peer registry, fixed-dt game engine,
//! leaderboard persistence and file-transfer session management. Nothing
//! in here owns a socket directly — `ast-sys` wires these against real
//! `DatagramEndpoint`s and threads.

pub mod filexfer;
pub mod game;
pub mod registry;
pub mod server;
