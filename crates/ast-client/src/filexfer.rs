// filexfer.rs — client-side file-transfer data-plane session (§4.10).
//
// The control-plane DOWNLOAD_REQ/RSP/ERR exchange is plain TCP and lives
// in `ast-sys` (the one place in this core that isn't UDP); this module
// only covers what happens after that handshake hands back a
// `(server_ip, ephemeral_udp_port, session_id, file_size, filename)`
// tuple: a dedicated `SrTransport` receiving chunked `DOWNLOAD_DATA`
// PDUs, writing each at its chunk's byte offset into a pre-sized file.
//
// `ast-client` does not depend on `ast-server`, so the chunk-header
// encoding (`chunk_index` as a 4-byte little-endian prefix ahead of the
// payload bytes, distinct from the wrapping SR sequence number, exactly
// as `ast_server::filexfer` frames it on the send side) is duplicated
// here rather than shared — see DESIGN.md.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use sha1::{Digest, Sha1};

use ast_common::net_addr::NetAddr;
use ast_common::srt::{PacketSink, SrTransport};
use ast_common::wire::{Command, MAX_PAYLOAD};
use ast_common::{console::log_dev, console::log_info};

const CHUNK_HEADER_LEN: usize = 4;
pub const EFFECTIVE_CHUNK_LEN: usize = MAX_PAYLOAD - CHUNK_HEADER_LEN;
pub const MAX_TRANSFER_SECS: u64 = 300;

pub fn total_packets(file_size: u64) -> u32 {
    if file_size == 0 {
        return 0;
    }
    ((file_size + EFFECTIVE_CHUNK_LEN as u64 - 1) / EFFECTIVE_CHUNK_LEN as u64) as u32
}

fn parse_chunk(payload: &[u8]) -> Option<(u32, &[u8])> {
    if payload.len() < CHUNK_HEADER_LEN {
        return None;
    }
    let idx = u32::from_le_bytes(payload[..CHUNK_HEADER_LEN].try_into().unwrap());
    Some((idx, &payload[CHUNK_HEADER_LEN..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    InProgress,
    Complete,
    Failed,
}

/// One inbound transfer: a file being chunked to this client by the
/// server over the session's dedicated UDP socket.
pub struct FileReceiveSession {
    pub session_id: u32,
    server: NetAddr,
    file: File,
    file_path: PathBuf,
    total_packets: u32,
    received_count: u32,
    received: Vec<bool>,
    srt: SrTransport,
    started_at: Instant,
}

impl FileReceiveSession {
    /// Pre-sizes the output file to `file_size`, per §4.10 "Client
    /// pre-sizes the output file to file_size".
    pub fn new(
        session_id: u32,
        server: NetAddr,
        file_path: PathBuf,
        file_size: u64,
    ) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&file_path)?;
        file.set_len(file_size)?;
        let total = total_packets(file_size);
        Ok(Self {
            session_id,
            server,
            file,
            file_path,
            total_packets: total,
            received_count: 0,
            received: vec![false; total as usize],
            srt: SrTransport::new(),
            started_at: Instant::now(),
        })
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    /// Feed one raw datagram from the session's dedicated socket through
    /// the SR transport, writing every newly delivered chunk at its
    /// offset (`chunk_index * EFFECTIVE_CHUNK_LEN`) and returning the
    /// transfer's status after this call.
    pub fn handle_inbound(
        &mut self,
        sink: &mut impl PacketSink,
        raw: &[u8],
        now: u64,
    ) -> ReceiveStatus {
        if self.started_at.elapsed() > Duration::from_secs(MAX_TRANSFER_SECS) {
            log_dev(format!("filexfer: session {} exceeded wall-clock bound", self.session_id));
            return ReceiveStatus::Failed;
        }

        let delivered = self.srt.on_receive(sink, self.server, raw, now);
        for (command, payload) in delivered {
            if command != Command::DownloadData {
                log_dev(format!("filexfer: unexpected {command:?} on data socket, ignoring"));
                continue;
            }
            let Some((chunk_index, data)) = parse_chunk(&payload) else {
                log_dev("filexfer: malformed chunk payload, dropping".to_string());
                continue;
            };
            if let Err(e) = self.write_chunk(chunk_index, data) {
                log_dev(format!("filexfer: write failed for chunk {chunk_index}: {e}"));
                return ReceiveStatus::Failed;
            }
        }

        self.status()
    }

    fn write_chunk(&mut self, chunk_index: u32, data: &[u8]) -> io::Result<()> {
        if chunk_index as usize >= self.received.len() {
            return Ok(());
        }
        if self.received[chunk_index as usize] {
            return Ok(()); // duplicate, already written
        }
        let offset = chunk_index as u64 * EFFECTIVE_CHUNK_LEN as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.received[chunk_index as usize] = true;
        self.received_count += 1;
        Ok(())
    }

    fn status(&self) -> ReceiveStatus {
        if self.received_count == self.total_packets {
            ReceiveStatus::Complete
        } else {
            ReceiveStatus::InProgress
        }
    }

    /// Compute the SHA-1 of the completed file for a client-local
    /// integrity check (S6): the wire protocol carries no hash field, so
    /// this never crosses the network; it is purely a local "did the
    /// bytes land intact" log line.
    pub fn verify_hash(&self) -> io::Result<String> {
        let bytes = std::fs::read(&self.file_path)?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        log_info(format!("filexfer: {} sha1 {hex}", self.file_path.display()));
        Ok(hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_common::wire::Packet;

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<(NetAddr, Vec<u8>)>,
    }

    impl PacketSink for RecordingSink {
        fn send_raw(&mut self, peer: NetAddr, bytes: &[u8]) {
            self.sent.push((peer, bytes.to_vec()));
        }
    }

    fn server() -> NetAddr {
        NetAddr::new([127, 0, 0, 1], 9500)
    }

    fn chunk_payload(chunk_index: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + data.len());
        out.extend_from_slice(&chunk_index.to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn total_packets_matches_server_side_formula() {
        assert_eq!(total_packets(0), 0);
        assert_eq!(total_packets(EFFECTIVE_CHUNK_LEN as u64), 1);
        assert_eq!(total_packets(EFFECTIVE_CHUNK_LEN as u64 + 1), 2);
    }

    #[test]
    fn s6_receiving_every_chunk_completes_and_writes_in_order() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ast_test_recv_{}.bin", std::process::id()));

        let file_size = (EFFECTIVE_CHUNK_LEN * 2 + 10) as u64;
        let mut session = FileReceiveSession::new(1, server(), path.clone(), file_size).unwrap();

        let mut sink = RecordingSink::default();
        let chunk0 = chunk_payload(0, &vec![0xAA; EFFECTIVE_CHUNK_LEN]);
        let chunk1 = chunk_payload(1, &vec![0xBB; EFFECTIVE_CHUNK_LEN]);
        let chunk2 = chunk_payload(2, &vec![0xCC; 10]);

        let pkt0 = Packet::data(Command::DownloadData, 0, chunk0).encode();
        let pkt1 = Packet::data(Command::DownloadData, 1, chunk1).encode();
        let pkt2 = Packet::data(Command::DownloadData, 2, chunk2).encode();

        assert_eq!(session.handle_inbound(&mut sink, &pkt0, 0), ReceiveStatus::InProgress);
        assert_eq!(session.handle_inbound(&mut sink, &pkt1, 0), ReceiveStatus::InProgress);
        assert_eq!(session.handle_inbound(&mut sink, &pkt2, 0), ReceiveStatus::Complete);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), file_size as usize);
        assert_eq!(bytes[0], 0xAA);
        assert_eq!(bytes[EFFECTIVE_CHUNK_LEN], 0xBB);
        assert_eq!(bytes[EFFECTIVE_CHUNK_LEN * 2], 0xCC);

        session.verify_hash().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn duplicate_chunk_is_not_double_counted() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ast_test_recv_dup_{}.bin", std::process::id()));
        let file_size = EFFECTIVE_CHUNK_LEN as u64;
        let mut session = FileReceiveSession::new(2, server(), path.clone(), file_size).unwrap();
        let mut sink = RecordingSink::default();

        let chunk0 = chunk_payload(0, &vec![1u8; EFFECTIVE_CHUNK_LEN]);
        let pkt0 = Packet::data(Command::DownloadData, 0, chunk0).encode();

        assert_eq!(session.handle_inbound(&mut sink, &pkt0, 0), ReceiveStatus::Complete);
        // SR-layer retransmit: delivered again at a new wire sequence in
        // principle, but even a raw re-delivery of the same chunk index
        // must not regress the completion count.
        assert_eq!(session.received_count, 1);

        let _ = std::fs::remove_file(&path);
    }
}
