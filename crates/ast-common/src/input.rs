// input.rs — per-peer input latch and the single-action-per-PDU wire tag
// (§4.7). The spec's Open Questions resolve the `==` vs bitwise `&` source
// ambiguity in favor of `==`: the client emits exactly one action tag per
// `INPUT` PDU, never a combined bitmask.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    None = 0,
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
    Fire = 5,
}

impl Action {
    pub fn from_u8(v: u8) -> Option<Action> {
        Some(match v {
            0 => Action::None,
            1 => Action::Up,
            2 => Action::Down,
            3 => Action::Left,
            4 => Action::Right,
            5 => Action::Fire,
            _ => return None,
        })
    }
}

/// Latched motion/fire intent for one peer, rebuilt from a stream of
/// single-action `INPUT` PDUs between ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputLatch {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
    /// True only on the tick fire was first latched; cleared once the
    /// tick engine consumes it (§4.4 item 1 "fire edge").
    pub edge_fire: bool,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one received action. `NONE` clears motion intent; motion
    /// actions collapse to "last one wins" for their axis; `FIRE` sets
    /// the latch and, if it transitions false→true, raises `edge_fire`.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::None => {
                self.up = false;
                self.down = false;
                self.left = false;
                self.right = false;
            }
            Action::Up => {
                self.up = true;
                self.down = false;
            }
            Action::Down => {
                self.down = true;
                self.up = false;
            }
            Action::Left => {
                self.left = true;
                self.right = false;
            }
            Action::Right => {
                self.right = true;
                self.left = false;
            }
            Action::Fire => {
                if !self.fire {
                    self.edge_fire = true;
                }
                self.fire = true;
            }
        }
    }

    /// Consume the fire edge for this tick (the game loop calls this
    /// once per tick after reading it). Also drops the underlying `fire`
    /// level: the client only ever reports the key-down transition, never
    /// a release, so without this a single press would latch `fire` true
    /// forever and no later press could ever raise a fresh edge.
    pub fn take_fire_edge(&mut self) -> bool {
        let had = self.edge_fire;
        self.edge_fire = false;
        self.fire = false;
        had
    }
}
