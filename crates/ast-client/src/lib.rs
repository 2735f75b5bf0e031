//! Client-side SR peer wrapper, input capture/latch, snapshot-apply and
//! interpolation smoothing, file-transfer client session. Nothing in here
//! owns a socket directly — `ast-sys` wires these against real
//! `DatagramEndpoint`s and threads, same split as `ast-server`.

pub mod client;
pub mod filexfer;
pub mod input;
pub mod name;
pub mod smoothing;
