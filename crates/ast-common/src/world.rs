// world.rs — fixed-size world state shared by the game tick engine and
// the snapshot codec (§3 "World state").

use std::collections::HashMap;

use crate::input::InputLatch;

pub const MAX_PLAYERS: usize = 4;
pub const MAX_OBJECTS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ObjectKind {
    None = 0,
    Ship = 1,
    Bullet = 2,
    Asteroid = 3,
    Wall = 4,
}

impl ObjectKind {
    pub fn from_u16(v: u16) -> Option<ObjectKind> {
        Some(match v {
            0 => ObjectKind::None,
            1 => ObjectKind::Ship,
            2 => ObjectKind::Bullet,
            3 => ObjectKind::Asteroid,
            4 => ObjectKind::Wall,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Object {
    pub kind: ObjectKind,
    pub owner_id: u16,
    pub pos: [f32; 2],
    pub vel: [f32; 2],
    pub rot: f32,
    pub scale: [f32; 2],
}

impl Object {
    pub const fn empty() -> Self {
        Self {
            kind: ObjectKind::None,
            owner_id: 0,
            pos: [0.0, 0.0],
            vel: [0.0, 0.0],
            rot: 0.0,
            scale: [0.0, 0.0],
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.kind, ObjectKind::None)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u16,
    pub score: u32,
    pub lives: u8,
    pub name: String,
    pub in_use: bool,
}

impl Player {
    pub fn new(id: u16, name: String) -> Self {
        Self {
            id,
            score: 0,
            lives: 3,
            name,
            in_use: true,
        }
    }
}

/// The full authoritative world mirrored into every `SNAPSHOT` (§4.6),
/// plus the per-peer input latches that share its mutex (§5, protected
/// region 1: "World state + input latches").
pub struct World {
    pub world_seq: u32,
    pub players: Vec<Player>,
    pub objects: [Object; MAX_OBJECTS],
    pub width: f32,
    pub height: f32,
    pub input: HashMap<u16, InputLatch>,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            world_seq: 0,
            players: Vec::with_capacity(MAX_PLAYERS),
            objects: [Object::empty(); MAX_OBJECTS],
            width,
            height,
            input: HashMap::new(),
        }
    }

    pub fn player_mut(&mut self, id: u16) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player(&self, id: u16) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// First free object slot, or `None` if the table is full.
    pub fn free_object_slot(&self) -> Option<usize> {
        self.objects.iter().position(|o| !o.is_live())
    }

    pub fn spawn_object(&mut self, obj: Object) -> Option<usize> {
        let slot = self.free_object_slot()?;
        self.objects[slot] = obj;
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_into_first_free_slot() {
        let mut w = World::new(800.0, 600.0);
        let slot = w
            .spawn_object(Object {
                kind: ObjectKind::Bullet,
                owner_id: 1,
                ..Object::empty()
            })
            .unwrap();
        assert_eq!(slot, 0);
        assert!(w.objects[0].is_live());
    }

    #[test]
    fn table_full_returns_none() {
        let mut w = World::new(800.0, 600.0);
        for _ in 0..MAX_OBJECTS {
            w.spawn_object(Object {
                kind: ObjectKind::Asteroid,
                ..Object::empty()
            })
            .unwrap();
        }
        assert!(w.spawn_object(Object::empty()).is_none());
    }
}
