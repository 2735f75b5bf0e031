// client.rs — client-side SR peer wrapper and state machine (§4.3, §4.11,
// §5 "client runs: one thread for SR ingest and game-state updates").
//
// Mirrors `ast_server::server::ServerContext`'s split between transport
// plumbing (`impl PacketSink`, pure logic) and the concrete socket, which
// `ast-sys` supplies. The client only ever talks to one peer (the server),
// so unlike the server's registry this holds a single `ClientState` rather
// than a map.

use ast_common::error::TransportError;
use ast_common::net_addr::NetAddr;
use ast_common::snapshot::{decode_snapshot, DecodedSnapshot};
use ast_common::srt::{PacketSink, SrTransport};
use ast_common::wire::{Command, MsgReader};
use ast_common::{console::log_dev, console::log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unknown,
    Connected,
    Joining,
    InGame,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct GameStartInfo {
    pub player_id: u16,
    pub lives: u16,
    pub name: String,
}

/// Client-side mirror of one server connection: the SR transport bound to
/// that single peer, the peer state machine (§4.11), and the latest
/// delivered world snapshot / leaderboard for the render layer to read.
pub struct GameClient {
    server: NetAddr,
    srt: SrTransport,
    pub state: ClientState,
    last_world_seq: Option<u32>,
    pub last_snapshot: Option<DecodedSnapshot>,
    pub leaderboard_lines: Vec<String>,
    pub start_info: Option<GameStartInfo>,
}

impl GameClient {
    pub fn new(server: NetAddr) -> Self {
        Self {
            server,
            srt: SrTransport::new(),
            state: ClientState::Unknown,
            last_world_seq: None,
            last_snapshot: None,
            leaderboard_lines: Vec::new(),
            start_info: None,
        }
    }

    pub fn server_addr(&self) -> NetAddr {
        self.server
    }

    /// `REQ_CONNECT`, carrying the requested display name as the payload.
    pub fn connect(&mut self, sink: &mut impl PacketSink, name: &str, now: u64) {
        let payload = name.as_bytes().to_vec();
        match self.srt.send(sink, self.server, Command::ReqConnect, payload, now) {
            Ok(_) => self.state = ClientState::Connected,
            Err(e) => log_dev(format!("client: connect send failed: {e}")),
        }
    }

    /// `REQ_GAME_START`, only meaningful once `Connected`.
    pub fn request_game_start(&mut self, sink: &mut impl PacketSink, now: u64) {
        if self.state != ClientState::Connected {
            log_dev("client: REQ_GAME_START requested outside Connected state".to_string());
            return;
        }
        match self.srt.send(sink, self.server, Command::ReqGameStart, vec![], now) {
            Ok(_) => self.state = ClientState::Joining,
            Err(e) => log_dev(format!("client: game-start send failed: {e}")),
        }
    }

    /// One `INPUT` PDU carrying a single action tag (§4.7).
    pub fn send_input(&mut self, sink: &mut impl PacketSink, action: ast_common::input::Action, now: u64) {
        if self.state != ClientState::InGame {
            return;
        }
        let _ = self.srt.send(sink, self.server, Command::Input, vec![action as u8], now);
    }

    /// `REQ_QUIT`; the caller tears the socket down once this returns.
    pub fn quit(&mut self, sink: &mut impl PacketSink, now: u64) {
        let _ = self.srt.send(sink, self.server, Command::ReqQuit, vec![], now);
        self.state = ClientState::Disconnected;
    }

    /// Retransmit/timeout scan; returns `true` if the server was declared
    /// unresponsive (accumulated timeout exceeded), in which case the
    /// caller should tear down and return to the main menu.
    pub fn tick(&mut self, sink: &mut impl PacketSink, now: u64) -> bool {
        let lost = self.srt.tick(sink, now);
        if lost.contains(&self.server) {
            log_info("client: server unresponsive".to_string());
            self.state = ClientState::Disconnected;
            return true;
        }
        false
    }

    /// Feed one raw datagram from the game-traffic socket through the SR
    /// transport and apply whatever it makes newly deliverable.
    pub fn handle_inbound(&mut self, sink: &mut impl PacketSink, raw: &[u8], now: u64) {
        let delivered = self.srt.on_receive(sink, self.server, raw, now);
        for (command, payload) in delivered {
            self.apply(command, &payload);
        }
    }

    fn apply(&mut self, command: Command, payload: &[u8]) {
        match command {
            Command::RspGameStart => self.apply_game_start(payload),
            Command::Snapshot => self.apply_snapshot(payload),
            Command::Leaderboard => self.apply_leaderboard(payload),
            other => log_dev(format!("client: unexpected {other:?} on game socket, dropping")),
        }
    }

    fn apply_game_start(&mut self, payload: &[u8]) {
        let mut r = MsgReader::new(payload);
        let (Some(player_id), Some(lives), Some(name_bytes)) =
            (r.read_u16(), r.read_u16(), r.read_bytes(8))
        else {
            log_dev("client: malformed RSP_GAME_START, ignoring".to_string());
            return;
        };
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
        let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
        self.state = ClientState::InGame;
        self.start_info = Some(GameStartInfo { player_id, lives, name });
        log_info(format!("client: game started, player_id={player_id}"));
    }

    /// §5 "Ordering guarantees": a client must ignore any snapshot with
    /// `world_seq <= last_applied`.
    fn apply_snapshot(&mut self, payload: &[u8]) {
        let Some(snap) = decode_snapshot(payload) else {
            log_dev("client: malformed SNAPSHOT, ignoring".to_string());
            return;
        };
        if let Some(last) = self.last_world_seq {
            if snap.world_seq <= last {
                return;
            }
        }
        self.last_world_seq = Some(snap.world_seq);
        self.last_snapshot = Some(snap);
    }

    fn apply_leaderboard(&mut self, payload: &[u8]) {
        let mut r = MsgReader::new(payload);
        let Some(count) = r.read_u32() else {
            log_dev("client: malformed LEADERBOARD, ignoring".to_string());
            return;
        };
        let mut lines = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (Some(id), Some(name_bytes), Some(score)) =
                (r.read_u16(), r.read_bytes(8), r.read_u32())
            else {
                log_dev("client: truncated LEADERBOARD, ignoring".to_string());
                return;
            };
            let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
            let _ = id;
            lines.push(format!("{name:<8} {score}"));
        }
        self.leaderboard_lines = lines;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
        NetAddr::new([127, 0, 0, 1], 9001)
    }

    #[test]
    fn connect_moves_to_connected_and_sends_req_connect() {
        let mut client = GameClient::new(server());
        let mut sink = RecordingSink::default();
        client.connect(&mut sink, "alice", 0);

        assert_eq!(client.state, ClientState::Connected);
        assert_eq!(sink.sent.len(), 1);
        let pkt = ast_common::wire::Packet::decode(&sink.sent[0].1).unwrap();
        assert_eq!(pkt.command, Command::ReqConnect);
    }

    #[test]
    fn game_start_requires_connected_state() {
        let mut client = GameClient::new(server());
        let mut sink = RecordingSink::default();
        client.request_game_start(&mut sink, 0);
        assert_eq!(client.state, ClientState::Unknown);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn snapshot_with_non_increasing_world_seq_is_ignored() {
        let mut client = GameClient::new(server());
        client.last_world_seq = Some(5);

        let mut world = ast_common::world::World::new(800.0, 600.0);
        world.world_seq = 5;
        let bytes = ast_common::snapshot::encode_snapshot(&world);
        client.apply_snapshot(&bytes);

        assert!(client.last_snapshot.is_none());
    }

    #[test]
    fn snapshot_with_increasing_world_seq_is_applied() {
        let mut client = GameClient::new(server());
        client.last_world_seq = Some(5);

        let mut world = ast_common::world::World::new(800.0, 600.0);
        world.world_seq = 6;
        let bytes = ast_common::snapshot::encode_snapshot(&world);
        client.apply_snapshot(&bytes);

        assert_eq!(client.last_snapshot.unwrap().world_seq, 6);
    }

    #[test]
    fn server_declared_lost_transitions_to_disconnected() {
        let mut client = GameClient::new(server());
        let mut sink = RecordingSink::default();
        client.connect(&mut sink, "a", 0);

        let went_disconnected = client.tick(&mut sink, ast_common::srt::TIMEOUT_MS_MAX + 1);
        assert!(went_disconnected);
        assert_eq!(client.state, ClientState::Disconnected);
    }
}
