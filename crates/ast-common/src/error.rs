// error.rs — error kinds for the transport and game-state core.
//
// The engine this was grown from has no thiserror/anyhow dependency; it
// prints through com_error and either panics (ERR_FATAL) or swallows the
// condition at the call site (ERR_DROP). This keeps that shape — plain
// enums, hand-written Display, no derive-macro error crate — but returns
// them through Result so recoverable paths use `?` instead of a panic.

use std::fmt;
use std::io;

/// Transport-layer failure. Only `SocketFatal` should ever reach `main`
/// and cause a non-zero exit; everything else is logged and swallowed at
/// the component boundary that produced it.
#[derive(Debug)]
pub enum TransportError {
    /// Bind/socket-creation failure, or a send error other than transient.
    SocketFatal(io::Error),
    /// Would-block or a one-shot unreachable-address error; drop and continue.
    SocketTransient(io::Error),
    /// SR flow exceeded its accumulated timeout budget; the peer is purged.
    PeerLost,
    /// Length or command-tag mismatch on a received PDU; dropped, not escalated.
    MalformedPacket(&'static str),
    /// Caller tried to send while the window was saturated.
    WindowFull,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::SocketFatal(e) => write!(f, "socket fatal: {e}"),
            TransportError::SocketTransient(e) => write!(f, "socket transient: {e}"),
            TransportError::PeerLost => write!(f, "peer lost: accumulated timeout exceeded"),
            TransportError::MalformedPacket(why) => write!(f, "malformed packet: {why}"),
            TransportError::WindowFull => write!(f, "send window full"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::WouldBlock {
            TransportError::SocketTransient(e)
        } else {
            TransportError::SocketFatal(e)
        }
    }
}

/// File-transfer control-plane / session failure.
#[derive(Debug)]
pub enum FileXferError {
    /// Requested file does not exist on the server; `DOWNLOAD_ERR` is sent,
    /// no session is created.
    FileMissing,
    /// Per-session failure after exceeding retry count or wall-clock bound.
    TransferFailed(String),
}

impl fmt::Display for FileXferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileXferError::FileMissing => write!(f, "file missing"),
            FileXferError::TransferFailed(why) => write!(f, "transfer failed: {why}"),
        }
    }
}

impl std::error::Error for FileXferError {}

/// Configuration-file parse failure. Always fatal to startup.
#[derive(Debug)]
pub struct ConfigError {
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(n) => write!(f, "config error at line {n}: {}", self.message),
            None => write!(f, "config error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}
