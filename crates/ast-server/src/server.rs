// server.rs — authoritative server context (§4.3, §4.4, §4.8, §5).
//
// Owns the three protected regions of §5 as separate mutexes (world+input,
// registry, leaderboard) plus the game-traffic `SrTransport`. Dispatch is
// pure logic over `impl PacketSink`; the concrete socket lives in
// ast-sys, kept out of this crate so the protocol and the platform layer
// stay decoupled, same split as the teacher's net.rs/server.rs boundary.

use std::path::PathBuf;

use parking_lot::Mutex;

use ast_common::error::TransportError;
use ast_common::net_addr::NetAddr;
use ast_common::snapshot::encode_snapshot;
use ast_common::srt::{PacketSink, SrTransport};
use ast_common::wire::Command;
use ast_common::world::{Player, World};
use ast_common::{console::log_dev, console::log_info, input::Action, leaderboard::Leaderboard};

use crate::game::{GameEngine, TickOutcome};
use crate::registry::{ConnectOutcome, PeerState, SessionRegistry};

pub struct ServerConfig {
    pub world_width: f32,
    pub world_height: f32,
    pub required_players: usize,
    pub registry_capacity: usize,
    pub leaderboard_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            required_players: 2,
            registry_capacity: 4,
            leaderboard_path: PathBuf::from("leaderboard.bin"),
        }
    }
}

/// Acquisition order when more than one lock is needed: world before
/// registry, registry before leaderboard (§5 "Shared-resource policy").
pub struct ServerContext {
    pub world: Mutex<World>,
    pub registry: Mutex<SessionRegistry>,
    pub leaderboard: Mutex<Leaderboard>,
    pub engine: Mutex<GameEngine>,
    pub srt: Mutex<SrTransport>,
    pub config: ServerConfig,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let mut leaderboard = Leaderboard::new();
        if let Err(e) = leaderboard.load(&config.leaderboard_path) {
            log_dev(format!(
                "leaderboard: could not read {}: {e} (starting empty)",
                config.leaderboard_path.display()
            ));
        }
        Self {
            world: Mutex::new(World::new(config.world_width, config.world_height)),
            registry: Mutex::new(SessionRegistry::new(config.registry_capacity)),
            leaderboard: Mutex::new(leaderboard),
            engine: Mutex::new(GameEngine::new()),
            srt: Mutex::new(SrTransport::new()),
            config,
        }
    }

    /// Feed one raw datagram received on the game-traffic socket through
    /// the SR transport, then dispatch whatever application payloads it
    /// makes newly deliverable.
    pub fn handle_inbound(
        &self,
        sink: &mut impl PacketSink,
        peer: NetAddr,
        raw: &[u8],
        now: u64,
    ) {
        let delivered = self.srt.lock().on_receive(sink, peer, raw, now);
        for (command, payload) in delivered {
            self.dispatch(sink, peer, command, payload, now);
        }
    }

    fn dispatch(&self, sink: &mut impl PacketSink, peer: NetAddr, command: Command, payload: Vec<u8>, now: u64) {
        match command {
            Command::ReqConnect => self.on_req_connect(peer, &payload),
            Command::ReqGameStart => self.on_req_game_start(sink, peer, now),
            Command::ReqQuit => self.on_req_quit(peer),
            Command::Input => self.on_input(peer, &payload),
            other => {
                log_dev(format!("server: unexpected {other:?} on game socket from {peer}, dropping"));
            }
        }
    }

    /// §4.3: the SR-layer ACK already happened inside `on_receive` (the
    /// transport must slide the sender's window regardless of whether the
    /// application accepts the connection); this only decides whether a
    /// `Peer` record gets created. An optional payload carries the
    /// player's requested display name.
    fn on_req_connect(&self, peer: NetAddr, payload: &[u8]) {
        let outcome = self.registry.lock().req_connect(peer);
        match outcome {
            ConnectOutcome::Accepted => {
                log_info(format!("server: {peer} connected"));
                if !payload.is_empty() {
                    if let Some(p) = self.registry.lock().get_mut(peer) {
                        p.name = String::from_utf8_lossy(payload).into_owned();
                    }
                }
            }
            ConnectOutcome::AlreadyConnected => {
                log_dev(format!("server: duplicate REQ_CONNECT from {peer} (retransmit)"));
            }
            ConnectOutcome::Full => {
                log_info(format!("server: rejecting {peer}, registry at capacity"));
            }
        }
    }

    fn on_req_game_start(&self, sink: &mut impl PacketSink, peer: NetAddr, now: u64) {
        if !self.registry.lock().req_game_start(peer) {
            log_dev(format!("server: REQ_GAME_START from unconnected {peer}, dropping"));
            return;
        }

        let started = self.registry.lock().try_start_game(self.config.required_players);
        if started.is_empty() {
            return;
        }

        let mut world = self.world.lock();
        let first_wave = world.players.is_empty();
        for addr in &started {
            let name = self
                .registry
                .lock()
                .get(*addr)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let name = if name.is_empty() {
                format!("Player{}", addr.peer_id())
            } else {
                name
            };
            world.players.push(Player::new(addr.peer_id(), name.clone()));
            crate::game::spawn_ship(&mut world, addr.peer_id());
            log_info(format!("server: {addr} ({name}) entering InGame"));
        }
        if first_wave {
            crate::game::seed_asteroids(&mut world, crate::game::INITIAL_ASTEROIDS);
        }
        drop(world);

        for addr in &started {
            let (name, lives) = self
                .world
                .lock()
                .player(addr.peer_id())
                .map(|p| (p.name.clone(), p.lives))
                .unwrap_or_default();
            let mut sb = ast_common::wire::SizeBuf::with_capacity(12);
            ast_common::wire::msg_write_u16(&mut sb, addr.peer_id());
            ast_common::wire::msg_write_u16(&mut sb, lives as u16);
            let mut name_buf = [0u8; 8];
            let bytes = name.as_bytes();
            let n = bytes.len().min(8);
            name_buf[..n].copy_from_slice(&bytes[..n]);
            ast_common::wire::msg_write_bytes(&mut sb, &name_buf);
            let payload = sb.into_bytes();
            match self.srt.lock().send(sink, *addr, Command::RspGameStart, payload, now) {
                Ok(_) => {}
                Err(TransportError::WindowFull) => {
                    log_dev(format!("server: window full sending RSP_GAME_START to {addr}"));
                }
                Err(e) => log_dev(format!("server: error sending RSP_GAME_START to {addr}: {e}")),
            }
        }
    }

    fn on_req_quit(&self, peer: NetAddr) {
        if let Some(p) = self.registry.lock().remove(peer) {
            log_info(format!("server: {peer} quit"));
            let id = p.addr.peer_id();
            self.world.lock().players.retain(|pl| pl.id != id);
            self.world.lock().input.remove(&id);
        }
        self.srt.lock().remove_peer(peer);
    }

    fn on_input(&self, peer: NetAddr, payload: &[u8]) {
        let in_game = matches!(
            self.registry.lock().get(peer).map(|p| p.state),
            Some(PeerState::InGame)
        );
        if !in_game {
            log_dev(format!("server: INPUT from non-InGame peer {peer}, dropping"));
            return;
        }
        let Some(&tag) = payload.first() else {
            return;
        };
        let Some(action) = Action::from_u8(tag) else {
            log_dev(format!("server: malformed INPUT action {tag} from {peer}"));
            return;
        };
        crate::game::apply_input(&mut self.world.lock(), peer.peer_id(), action);
    }

    /// One fixed-dt tick (§4.4). Returns `true` once the game-over phase
    /// has been entered (the caller should stop calling `tick` and start
    /// broadcasting the leaderboard via `broadcast_leaderboard`).
    pub fn tick(&self, dt: f32) -> bool {
        let outcome = {
            let mut world = self.world.lock();
            let mut engine = self.engine.lock();
            engine.tick(&mut world, dt)
        };
        if outcome == TickOutcome::GameOver {
            self.finalize_leaderboard();
            true
        } else {
            false
        }
    }

    fn finalize_leaderboard(&self) {
        let world = self.world.lock();
        let now = chrono_like_timestamp();
        let mut leaderboard = self.leaderboard.lock();
        for p in world.players.iter() {
            leaderboard.add(p.id, p.name.clone(), p.score, now.clone());
        }
        drop(leaderboard);
        drop(world);
        let leaderboard = self.leaderboard.lock();
        if let Err(e) = leaderboard.save(&self.config.leaderboard_path) {
            log_dev(format!("leaderboard: save failed: {e}"));
        }
    }

    /// Pack and reliably send the current world to every `InGame` peer
    /// (§4.4 item 6). A `WindowFull` peer is skipped for this cycle; the
    /// next broadcast will catch it up since snapshots are a continuous
    /// stream, not a one-shot delivery.
    pub fn broadcast_snapshot(&self, sink: &mut impl PacketSink, now: u64) {
        let bytes = encode_snapshot(&self.world.lock());
        let peers: Vec<NetAddr> = self
            .registry
            .lock()
            .in_state(PeerState::InGame)
            .map(|p| p.addr)
            .collect();
        let mut srt = self.srt.lock();
        for addr in peers {
            match srt.send(sink, addr, Command::Snapshot, bytes.clone(), now) {
                Ok(_) => {}
                Err(TransportError::WindowFull) => {}
                Err(e) => log_dev(format!("server: snapshot send error to {addr}: {e}")),
            }
        }
    }

    /// Broadcast the finalized leaderboard record to every `InGame` peer
    /// until acknowledged (§4.4 item 5: SR retransmission handles the
    /// "until acknowledged" part via `tick`).
    pub fn broadcast_leaderboard(&self, sink: &mut impl PacketSink, now: u64) {
        let payload = encode_leaderboard(&self.leaderboard.lock());
        let peers: Vec<NetAddr> = self
            .registry
            .lock()
            .in_state(PeerState::InGame)
            .map(|p| p.addr)
            .collect();
        let mut srt = self.srt.lock();
        for addr in peers {
            let _ = srt.send(sink, addr, Command::Leaderboard, payload.clone(), now);
        }
    }

    /// Scan the game-traffic SR transport for due retransmits and
    /// accumulated-timeout losses, purging any peer declared unresponsive.
    pub fn srt_tick(&self, sink: &mut impl PacketSink, now: u64) {
        let lost = self.srt.lock().tick(sink, now);
        for peer in lost {
            log_info(format!("server: {peer} unresponsive, purging"));
            self.on_req_quit(peer);
        }
    }
}

/// Human-readable record for the leaderboard's binary payload (§6
/// "Leaderboard payload: raw leaderboard record"). Kept here rather than
/// in ast-common since it is the wire framing of a server-owned value,
/// not the record shape itself (that lives in ast_common::leaderboard).
fn encode_leaderboard(lb: &Leaderboard) -> Vec<u8> {
    let mut sb = ast_common::wire::SizeBuf::new();
    ast_common::wire::msg_write_u32(&mut sb, lb.entries().len() as u32);
    for e in lb.entries() {
        ast_common::wire::msg_write_u16(&mut sb, e.id);
        let mut name = [0u8; 8];
        let bytes = e.name.as_bytes();
        let n = bytes.len().min(8);
        name[..n].copy_from_slice(&bytes[..n]);
        ast_common::wire::msg_write_bytes(&mut sb, &name);
        ast_common::wire::msg_write_u32(&mut sb, e.score);
    }
    sb.into_bytes()
}

/// Wall-clock timestamp for a leaderboard entry. The process clock, not
/// the monotonic `ast_common::time` source used for transport deadlines.
fn chrono_like_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}
