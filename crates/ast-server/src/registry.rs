// registry.rs — session/peer registry (§4.3).
//
// Structured like the engine's ServerStatic/Client split (server.rs): one
// record per known address, owned by a single struct instead of a
// process-global array, keyed by the peer's own UDP port (§4.3, §9
// "Cyclic references").

use std::collections::HashMap;

use ast_common::net_addr::NetAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connected,
    Joining,
    InGame,
}

#[derive(Debug, Clone)]
pub struct Peer {
    pub addr: NetAddr,
    pub state: PeerState,
    pub name: String,
    /// Round-trip time sampled from ACK delay, purely observational
    /// (status line / dev log), never affects transport or game logic.
    pub smoothed_rtt_ms: f32,
}

impl Peer {
    fn new(addr: NetAddr) -> Self {
        Self {
            addr,
            state: PeerState::Connected,
            name: String::new(),
            smoothed_rtt_ms: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Newly registered; caller should ACK and mark Connected.
    Accepted,
    /// Already known (retransmitted REQ_CONNECT); still ACK (S2).
    AlreadyConnected,
    /// Registry is at capacity; no peer created.
    Full,
}

pub struct SessionRegistry {
    peers: HashMap<NetAddr, Peer>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, addr: NetAddr) -> Option<&Peer> {
        self.peers.get(&addr)
    }

    pub fn get_mut(&mut self, addr: NetAddr) -> Option<&mut Peer> {
        self.peers.get_mut(&addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn in_state(&self, state: PeerState) -> impl Iterator<Item = &Peer> {
        self.peers.values().filter(move |p| p.state == state)
    }

    pub fn joining_count(&self) -> usize {
        self.in_state(PeerState::Joining).count()
    }

    /// `REQ_CONNECT` from an address not yet known: register it if there
    /// is capacity. Idempotent under retransmission — an already-known
    /// address is reported as already-connected, not re-created, so the
    /// registry keeps exactly one entry per peer (round-trip property,
    /// S2).
    pub fn req_connect(&mut self, addr: NetAddr) -> ConnectOutcome {
        if self.peers.contains_key(&addr) {
            return ConnectOutcome::AlreadyConnected;
        }
        if self.peers.len() >= self.capacity {
            return ConnectOutcome::Full;
        }
        self.peers.insert(addr, Peer::new(addr));
        ConnectOutcome::Accepted
    }

    /// `REQ_GAME_START`: only valid from `Connected`; moves to `Joining`.
    /// Idempotent — a peer already `Joining` or `InGame` is left alone and
    /// still reported as accepted so the caller re-ACKs.
    pub fn req_game_start(&mut self, addr: NetAddr) -> bool {
        match self.peers.get_mut(&addr) {
            Some(p) if p.state == PeerState::Connected => {
                p.state = PeerState::Joining;
                true
            }
            Some(p) if p.state == PeerState::Joining || p.state == PeerState::InGame => true,
            _ => false,
        }
    }

    /// Promote every `Joining` peer to `InGame` once `required_players`
    /// has been reached. Returns the promoted addresses so the caller can
    /// emit `RSP_GAME_START` to each.
    pub fn try_start_game(&mut self, required_players: usize) -> Vec<NetAddr> {
        if self.joining_count() < required_players {
            return Vec::new();
        }
        let mut started = Vec::new();
        for p in self.peers.values_mut() {
            if p.state == PeerState::Joining {
                p.state = PeerState::InGame;
                started.push(p.addr);
            }
        }
        started
    }

    /// `REQ_QUIT` or unresponsive-timeout: remove the peer entirely.
    pub fn remove(&mut self, addr: NetAddr) -> Option<Peer> {
        self.peers.remove(&addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> NetAddr {
        NetAddr::new([127, 0, 0, 1], port)
    }

    #[test]
    fn duplicate_connect_keeps_single_entry() {
        let mut reg = SessionRegistry::new(4);
        assert_eq!(reg.req_connect(addr(9001)), ConnectOutcome::Accepted);
        assert_eq!(reg.req_connect(addr(9001)), ConnectOutcome::AlreadyConnected);
        assert_eq!(reg.iter().count(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut reg = SessionRegistry::new(1);
        assert_eq!(reg.req_connect(addr(1)), ConnectOutcome::Accepted);
        assert_eq!(reg.req_connect(addr(2)), ConnectOutcome::Full);
    }

    #[test]
    fn two_joiners_start_the_game() {
        let mut reg = SessionRegistry::new(4);
        reg.req_connect(addr(1));
        reg.req_connect(addr(2));
        reg.req_game_start(addr(1));
        reg.req_game_start(addr(2));
        assert_eq!(reg.joining_count(), 2);

        let started = reg.try_start_game(2);
        assert_eq!(started.len(), 2);
        assert!(reg.in_state(PeerState::InGame).count() == 2);
        assert_eq!(reg.joining_count(), 0);
    }

    #[test]
    fn game_start_requires_connected_first() {
        let mut reg = SessionRegistry::new(4);
        assert!(!reg.req_game_start(addr(1)));
    }

    #[test]
    fn quit_removes_peer() {
        let mut reg = SessionRegistry::new(4);
        reg.req_connect(addr(1));
        assert!(reg.remove(addr(1)).is_some());
        assert!(reg.get(addr(1)).is_none());
    }
}
