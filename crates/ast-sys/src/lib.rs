//! Platform layer: non-blocking UDP socket plumbing, the TCP file-transfer
//! control plane, and the interactive startup CLI. The `ast-node` binary
//! (`src/bin/main.rs`) wires these against the pure-logic crates
//! `ast-server`/`ast-client`/`ast-common`.

pub mod cli;
pub mod filexfer_control;
pub mod net_udp;
