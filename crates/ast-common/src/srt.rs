// srt.rs — Selective-Repeat reliable datagram transport.
//
// Generalizes the shape of the engine's net_chan.rs (one struct per peer
// flow, an explicit send/tick/receive split, packets framed with
// SizeBuf-style headers) from Quake's "one reliable message in flight"
// netchan to a real W-wide sliding window, per the wire contract in
// wire.rs.

use std::collections::{HashMap, HashSet};

use crate::console::log_dev;
use crate::error::TransportError;
use crate::net_addr::NetAddr;
use crate::wire::{Command, Packet};

pub const SEQ_SPACE: u32 = 64;
pub const WINDOW_SIZE: u32 = 32;
pub const TIMEOUT_MS: u64 = 1_000;
pub const TIMEOUT_MS_MAX: u64 = 10_000;

/// Emits raw, already-encoded datagrams to a peer. Implemented by the
/// socket layer (ast-sys); kept as a trait here so the transport has no
/// dependency on any concrete socket type, mirroring how the engine's
/// net.rs dispatches through function pointers registered by the
/// platform layer instead of linking sockets directly into common code.
pub trait PacketSink {
    fn send_raw(&mut self, peer: NetAddr, bytes: &[u8]);
}

fn window_offset(seq: u32, base: u32) -> u32 {
    (seq + SEQ_SPACE - base) % SEQ_SPACE
}

/// Per-peer, per-direction SR bookkeeping (§3 "SR endpoint state").
#[derive(Default)]
struct SrEndpoint {
    send_base: u32,
    next_seq: u32,
    send_buffer: HashMap<u32, Packet>,
    send_timer: HashMap<u32, u64>,
    send_age: HashMap<u32, u64>,
    acked: HashSet<u32>,

    recv_base: u32,
    recv_buffer: HashMap<u32, Packet>,
}

impl SrEndpoint {
    fn outstanding(&self) -> u32 {
        window_offset(self.next_seq, self.send_base)
    }
}

/// Owns the SR state for every peer flow multiplexed over one datagram
/// endpoint (one `SrTransport` per socket: the game traffic socket, or a
/// file-transfer session's dedicated socket).
pub struct SrTransport {
    endpoints: HashMap<NetAddr, SrEndpoint>,
}

impl SrTransport {
    pub fn new() -> Self {
        assert!(
            SEQ_SPACE >= 2 * WINDOW_SIZE,
            "SEQ_SPACE must be >= 2*WINDOW_SIZE to avoid wraparound ambiguity"
        );
        Self {
            endpoints: HashMap::new(),
        }
    }

    /// Drop all state for a peer (on REQ_QUIT, or after the caller has
    /// acted on a `PeerLost` event from `tick`).
    pub fn remove_peer(&mut self, peer: NetAddr) {
        self.endpoints.remove(&peer);
    }

    pub fn has_peer(&self, peer: NetAddr) -> bool {
        self.endpoints.contains_key(&peer)
    }

    /// Count of sequence numbers sent but not yet ACKed for `peer` (§3
    /// "at most W outstanding"). Used by callers that need to know when a
    /// whole stream has drained, e.g. file transfer's "succeeds when
    /// send_base == total_packets" (§4.10).
    pub fn outstanding(&self, peer: NetAddr) -> u32 {
        self.endpoints.get(&peer).map(|ep| ep.outstanding()).unwrap_or(0)
    }

    /// Queue `payload` for reliable delivery to `peer`. Returns the
    /// sequence number it was stamped with, or `WindowFull` if the send
    /// window is saturated (§4.2).
    pub fn send(
        &mut self,
        sink: &mut impl PacketSink,
        peer: NetAddr,
        command: Command,
        payload: Vec<u8>,
        now: u64,
    ) -> Result<u32, TransportError> {
        let ep = self.endpoints.entry(peer).or_default();
        if ep.outstanding() >= WINDOW_SIZE {
            return Err(TransportError::WindowFull);
        }

        let seq = ep.next_seq;
        let packet = Packet::data(command, seq, payload);
        sink.send_raw(peer, &packet.encode());

        ep.send_buffer.insert(seq, packet);
        ep.send_timer.insert(seq, now);
        ep.send_age.insert(seq, 0);
        ep.next_seq = (ep.next_seq + 1) % SEQ_SPACE;
        Ok(seq)
    }

    /// Scan every flow's send buffer for entries due a retransmit or past
    /// their accumulated timeout budget. Returns the peers declared
    /// unresponsive this tick (§4.2 "declare the peer unresponsive");
    /// the caller is expected to purge them from the session registry.
    pub fn tick(&mut self, sink: &mut impl PacketSink, now: u64) -> Vec<NetAddr> {
        let mut lost = Vec::new();
        for (&peer, ep) in self.endpoints.iter_mut() {
            let mut due: Vec<u32> = ep
                .send_timer
                .iter()
                .filter(|(_, &last)| now.saturating_sub(last) >= TIMEOUT_MS)
                .map(|(&seq, _)| seq)
                .collect();
            due.sort_unstable();

            let mut unresponsive = false;
            for seq in due.drain(..) {
                let last = *ep.send_timer.get(&seq).unwrap();
                let elapsed = now.saturating_sub(last);
                let age = *ep.send_age.get(&seq).unwrap();
                if age + elapsed >= TIMEOUT_MS_MAX {
                    unresponsive = true;
                    break;
                }
                if let Some(packet) = ep.send_buffer.get(&seq) {
                    sink.send_raw(peer, &packet.encode());
                    log_dev(format!("srt: retransmit seq {seq} to {peer}"));
                }
                ep.send_timer.insert(seq, now);
                ep.send_age.insert(seq, age + elapsed);
            }

            if unresponsive {
                ep.send_buffer.clear();
                ep.send_timer.clear();
                ep.send_age.clear();
                ep.acked.clear();
                ep.next_seq = ep.send_base;
                lost.push(peer);
            }
        }
        lost
    }

    /// Feed one received datagram into the transport. Returns, in
    /// delivery order, every application payload this made newly
    /// deliverable. ACK emission and retransmission bookkeeping happen
    /// as a side effect through `sink`.
    pub fn on_receive(
        &mut self,
        sink: &mut impl PacketSink,
        peer: NetAddr,
        raw: &[u8],
        now: u64,
    ) -> Vec<(Command, Vec<u8>)> {
        let Some(packet) = Packet::decode(raw) else {
            log_dev(format!("srt: malformed packet from {peer}, dropping"));
            return Vec::new();
        };

        let ep = self.endpoints.entry(peer).or_default();

        if packet.is_ack() {
            if ep.send_buffer.contains_key(&packet.sequence) {
                ep.acked.insert(packet.sequence);
            }
            while ep.acked.remove(&ep.send_base) {
                ep.send_buffer.remove(&ep.send_base);
                ep.send_timer.remove(&ep.send_base);
                ep.send_age.remove(&ep.send_base);
                ep.send_base = (ep.send_base + 1) % SEQ_SPACE;
            }
            return Vec::new();
        }

        let ahead_offset = window_offset(packet.sequence, ep.recv_base);
        if ahead_offset >= WINDOW_SIZE {
            // Not in the current receive window. It may still be a
            // retransmit of something we already delivered (the client's
            // own ACK for it was lost) — re-ACK those without
            // re-delivering, so the sender's window can still advance
            // (S2). Anything further back than one full window is
            // genuinely out of range and dropped without a log-visible
            // ACK.
            let behind_offset = window_offset(ep.recv_base, packet.sequence);
            if behind_offset >= 1 && behind_offset <= WINDOW_SIZE {
                sink.send_raw(peer, &Packet::ack(packet.command, packet.sequence).encode());
            } else {
                log_dev(format!(
                    "srt: seq {} outside receive window from {peer}, dropping",
                    packet.sequence
                ));
            }
            return Vec::new();
        }

        let command = packet.command;
        let sequence = packet.sequence;
        ep.recv_buffer.insert(sequence, packet);
        sink.send_raw(peer, &Packet::ack(command, sequence).encode());

        let mut delivered = Vec::new();
        while let Some(p) = ep.recv_buffer.remove(&ep.recv_base) {
            delivered.push((p.command, p.payload));
            ep.recv_base = (ep.recv_base + 1) % SEQ_SPACE;
        }
        delivered
    }
}

impl Default for SrTransport {
    fn default() -> Self {
        Self::new()
    }
}
