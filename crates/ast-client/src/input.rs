// input.rs — key binding and the client-local input latch mirror (§4.7).
//
// The render/UI layer is external (§5); this module only owns the mapping
// from whatever discrete key-down/key-up events that layer reports into
// the single `Action` tag each `INPUT` PDU carries, plus a local mirror of
// `ast_common::input::InputLatch` so the client's own prediction/smoothing
// can see the same edge-triggered fire semantics the server applies,
// without waiting on a round trip.

use ast_common::input::{Action, InputLatch};

/// Named keys the binding table understands, independent of any particular
/// windowing/input crate (this spec carries no GPU/window dependency; the
/// external render layer is expected to normalize its own key codes down
/// to this small set before calling `InputCapture::on_key_event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKey {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl GameKey {
    /// Default binding: arrow keys or WASD for motion, Space to fire.
    pub fn from_name(name: &str) -> Option<GameKey> {
        Some(match name {
            "ArrowUp" | "w" | "W" => GameKey::Up,
            "ArrowDown" | "s" | "S" => GameKey::Down,
            "ArrowLeft" | "a" | "A" => GameKey::Left,
            "ArrowRight" | "d" | "D" => GameKey::Right,
            "Space" | " " => GameKey::Fire,
            _ => return None,
        })
    }

    fn to_action(self) -> Action {
        match self {
            GameKey::Up => Action::Up,
            GameKey::Down => Action::Down,
            GameKey::Left => Action::Left,
            GameKey::Right => Action::Right,
            GameKey::Fire => Action::Fire,
        }
    }
}

/// Tracks which game keys are currently held and mirrors the server's
/// `InputLatch` locally, so the caller can decide which single `Action`
/// tag to transmit on a key-down event (§4.7: one action per `INPUT` PDU,
/// never a combined bitmask) and so client-side prediction has the same
/// edge-triggered fire behaviour the server will compute.
#[derive(Default)]
pub struct InputCapture {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
    fire: bool,
    mirror: InputLatch,
}

impl InputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror(&self) -> &InputLatch {
        &self.mirror
    }

    /// Report a key transition. Returns the `Action` to send, if any:
    /// - A motion key going down sends that direction.
    /// - A motion key going up, when no other key on that axis is held,
    ///   sends `NONE` to clear latched motion (mirrors §4.7 "NONE clears
    ///   motion intent").
    /// - Fire going down sends `FIRE`; fire going up sends nothing (the
    ///   server's latch only cares about the down edge).
    pub fn on_key_event(&mut self, key: GameKey, pressed: bool) -> Option<Action> {
        match key {
            GameKey::Up | GameKey::Down => {
                let (same, other) = match key {
                    GameKey::Up => (&mut self.up, self.down),
                    GameKey::Down => (&mut self.down, self.up),
                    _ => unreachable!(),
                };
                *same = pressed;
                if pressed {
                    self.mirror.apply(key.to_action());
                    Some(key.to_action())
                } else if !other {
                    self.mirror.apply(Action::None);
                    Some(Action::None)
                } else {
                    None
                }
            }
            GameKey::Left | GameKey::Right => {
                let (same, other) = match key {
                    GameKey::Left => (&mut self.left, self.right),
                    GameKey::Right => (&mut self.right, self.left),
                    _ => unreachable!(),
                };
                *same = pressed;
                if pressed {
                    self.mirror.apply(key.to_action());
                    Some(key.to_action())
                } else if !other {
                    self.mirror.apply(Action::None);
                    Some(Action::None)
                } else {
                    None
                }
            }
            GameKey::Fire => {
                self.fire = pressed;
                if pressed {
                    self.mirror.apply(Action::Fire);
                    Some(Action::Fire)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_map_to_expected_keys() {
        assert_eq!(GameKey::from_name("ArrowUp"), Some(GameKey::Up));
        assert_eq!(GameKey::from_name("w"), Some(GameKey::Up));
        assert_eq!(GameKey::from_name("Space"), Some(GameKey::Fire));
        assert_eq!(GameKey::from_name("Escape"), None);
    }

    #[test]
    fn pressing_left_sends_left_and_releasing_sends_none() {
        let mut cap = InputCapture::new();
        assert_eq!(cap.on_key_event(GameKey::Left, true), Some(Action::Left));
        assert_eq!(cap.on_key_event(GameKey::Left, false), Some(Action::None));
    }

    #[test]
    fn releasing_one_of_two_opposed_keys_keeps_the_other_latched() {
        let mut cap = InputCapture::new();
        cap.on_key_event(GameKey::Left, true);
        cap.on_key_event(GameKey::Right, true);
        // Releasing left while right is still held should not clear motion.
        assert_eq!(cap.on_key_event(GameKey::Left, false), None);
        assert!(cap.mirror().right);
    }

    #[test]
    fn fire_release_sends_nothing() {
        let mut cap = InputCapture::new();
        assert_eq!(cap.on_key_event(GameKey::Fire, true), Some(Action::Fire));
        assert_eq!(cap.on_key_event(GameKey::Fire, false), None);
    }
}
