// filexfer.rs — server-side file-transfer session manager (§4.10, §3
// "File transfer session").
//
// Each session owns its own `SrTransport` instance (one per dedicated
// UDP socket, per spec: "each file transfer exclusively owns its session
// record and its dedicated socket") rather than sharing the game-traffic
// transport, so bulk transfer never contends with game traffic.
//
// Grounded on `Server_Project/server.cpp`'s `sendFileReliably`: that
// routine frames each packet with its own `fileOffset` field distinct
// from a `sessionId`, rather than reusing the transport's own wrapping
// sequence number for file positioning. This session does the same: the
// wire SRT `sequence` field wraps mod `SEQ_SPACE` as the transport
// requires, but the actual chunk index (used to compute the file byte
// offset) is carried as a 4-byte prefix inside the payload. This
// resolves an ambiguity in spec.md §4.10 ("sequence = chunk_index"),
// which only holds when a file has fewer chunks than `SEQ_SPACE` — for
// larger files the wire sequence necessarily wraps, so it cannot also
// serve as an absolute offset (see DESIGN.md).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ast_common::error::TransportError;
use ast_common::net_addr::NetAddr;
use ast_common::srt::SrTransport;
use ast_common::wire::{Command, MAX_PAYLOAD};
use ast_common::{console::log_dev, console::log_info};

pub const MAX_RETRIES: u32 = 10;
pub const MAX_TRANSFER_SECS: u64 = 300;
const CHUNK_HEADER_LEN: usize = 4;
pub const EFFECTIVE_CHUNK_LEN: usize = MAX_PAYLOAD - CHUNK_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Succeeded,
    Failed,
}

pub fn chunk_payload(chunk_index: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + data.len());
    out.extend_from_slice(&chunk_index.to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Decode a data-plane chunk payload back into `(chunk_index, data)`.
pub fn parse_chunk(payload: &[u8]) -> Option<(u32, &[u8])> {
    if payload.len() < CHUNK_HEADER_LEN {
        return None;
    }
    let idx = u32::from_le_bytes(payload[..CHUNK_HEADER_LEN].try_into().unwrap());
    Some((idx, &payload[CHUNK_HEADER_LEN..]))
}

pub fn total_packets(file_size: u64) -> u32 {
    if file_size == 0 {
        return 0;
    }
    ((file_size + EFFECTIVE_CHUNK_LEN as u64 - 1) / EFFECTIVE_CHUNK_LEN as u64) as u32
}

/// One outbound transfer: server chunking a file to a single requester
/// over a dedicated ephemeral UDP socket (§4.10, §3).
pub struct FileTransferSession {
    pub session_id: u32,
    pub peer: NetAddr,
    pub file_path: PathBuf,
    pub total_packets: u32,
    chunks: Vec<Vec<u8>>,
    next_chunk: u32,
    srt: SrTransport,
    started_at: Instant,
}

impl FileTransferSession {
    pub fn new(session_id: u32, peer: NetAddr, file_path: PathBuf, file_bytes: &[u8]) -> Self {
        let total = total_packets(file_bytes.len() as u64);
        let chunks = file_bytes
            .chunks(EFFECTIVE_CHUNK_LEN)
            .enumerate()
            .map(|(i, c)| chunk_payload(i as u32, c))
            .collect();
        Self {
            session_id,
            peer,
            file_path,
            total_packets: total,
            chunks,
            next_chunk: 0,
            srt: SrTransport::new(),
            started_at: Instant::now(),
        }
    }

    /// Feed a raw ACK datagram received on this session's dedicated
    /// socket into its transport.
    pub fn handle_inbound(&mut self, sink: &mut impl ast_common::srt::PacketSink, raw: &[u8], now: u64) {
        // Data plane is server -> client only; any payload inbound here
        // is an ACK for a chunk we sent.
        let _ = self.srt.on_receive(sink, self.peer, raw, now);
    }

    /// Advance the session: retransmit due chunks, push newly-sendable
    /// ones into the window, and report whether the transfer has
    /// completed (successfully or not). §4.10 "succeeds when send_base ==
    /// total_packets; fails after per-packet retries exceed MAX_RETRIES
    /// (10) [the transport's own accumulated-timeout budget is exactly
    /// TIMEOUT_MS_MAX / TIMEOUT_MS = 10 retries] or total wall-time
    /// exceeds 5 minutes".
    pub fn pump(&mut self, sink: &mut impl ast_common::srt::PacketSink, now: u64) -> SessionStatus {
        if self.started_at.elapsed() > Duration::from_secs(MAX_TRANSFER_SECS) {
            log_dev(format!("filexfer: session {} exceeded wall-clock bound", self.session_id));
            return SessionStatus::Failed;
        }

        let lost = self.srt.tick(sink, now);
        if !lost.is_empty() {
            log_dev(format!("filexfer: session {} peer unresponsive", self.session_id));
            return SessionStatus::Failed;
        }

        while self.next_chunk < self.total_packets {
            let payload = self.chunks[self.next_chunk as usize].clone();
            match self.srt.send(sink, self.peer, Command::DownloadData, payload, now) {
                Ok(_) => self.next_chunk += 1,
                Err(TransportError::WindowFull) => break,
                Err(e) => {
                    log_dev(format!("filexfer: send error session {}: {e}", self.session_id));
                    break;
                }
            }
        }

        if self.next_chunk == self.total_packets && self.srt.outstanding(self.peer) == 0 {
            log_info(format!("filexfer: session {} complete", self.session_id));
            SessionStatus::Succeeded
        } else {
            SessionStatus::InProgress
        }
    }
}

/// Registry of in-flight outbound transfers, keyed by session id. One
/// manager per server process; each session still owns its own socket —
/// this just tracks which sessions exist so a supervisor thread can pump
/// them and reap finished ones.
#[derive(Default)]
pub struct FileXferManager {
    sessions: HashMap<u32, FileTransferSession>,
    next_id: u32,
}

impl FileXferManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn start(&mut self, peer: NetAddr, file_path: PathBuf, file_bytes: &[u8]) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions
            .insert(id, FileTransferSession::new(id, peer, file_path, file_bytes));
        id
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut FileTransferSession> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<FileTransferSession> {
        self.sessions.remove(&id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<(NetAddr, Vec<u8>)>,
    }

    impl ast_common::srt::PacketSink for RecordingSink {
        fn send_raw(&mut self, peer: NetAddr, bytes: &[u8]) {
            self.sent.push((peer, bytes.to_vec()));
        }
    }

    fn peer() -> NetAddr {
        NetAddr::new([127, 0, 0, 1], 9500)
    }

    #[test]
    fn chunk_roundtrips_index_and_data() {
        let p = chunk_payload(7, b"hello");
        let (idx, data) = parse_chunk(&p).unwrap();
        assert_eq!(idx, 7);
        assert_eq!(data, b"hello");
    }

    #[test]
    fn total_packets_is_ceil_division() {
        assert_eq!(total_packets(0), 0);
        assert_eq!(total_packets(1), 1);
        assert_eq!(total_packets(EFFECTIVE_CHUNK_LEN as u64), 1);
        assert_eq!(total_packets(EFFECTIVE_CHUNK_LEN as u64 + 1), 2);
    }

    #[test]
    fn s6_small_file_completes_after_acking_every_chunk() {
        let data = vec![42u8; EFFECTIVE_CHUNK_LEN * 3 + 10];
        let mut session = FileTransferSession::new(1, peer(), PathBuf::from("f.bin"), &data);
        assert_eq!(session.total_packets, 4);

        let mut sink = RecordingSink::default();
        let status = session.pump(&mut sink, 0);
        assert_eq!(status, SessionStatus::InProgress);
        assert_eq!(session.next_chunk, 4);

        // ACK every sent chunk using the sequence the transport actually
        // stamped them with (echoed in each sent DATA packet's header).
        let acks: Vec<_> = sink
            .sent
            .iter()
            .map(|(_, bytes)| {
                let pkt = ast_common::wire::Packet::decode(bytes).unwrap();
                ast_common::wire::Packet::ack(pkt.command, pkt.sequence).encode()
            })
            .collect();
        sink.sent.clear();
        for ack in acks {
            session.handle_inbound(&mut sink, &ack, 10);
        }

        let status = session.pump(&mut sink, 10);
        assert_eq!(status, SessionStatus::Succeeded);
    }

    #[test]
    fn wall_clock_bound_fails_the_session() {
        let data = vec![1u8; 10];
        let mut session = FileTransferSession::new(1, peer(), PathBuf::from("f.bin"), &data);
        session.started_at = Instant::now() - Duration::from_secs(MAX_TRANSFER_SECS + 1);
        let mut sink = RecordingSink::default();
        assert_eq!(session.pump(&mut sink, 0), SessionStatus::Failed);
    }
}
