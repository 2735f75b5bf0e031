// snapshot.rs — fixed-layout SNAPSHOT payload codec (§4.6).
//
// Packed little-endian, constant length regardless of how many players or
// objects are actually live: unused slots are zeroed by the encoder so the
// decoder can reject anything whose length doesn't match exactly.

use crate::wire::{msg_write_bytes, msg_write_f32, msg_write_u16, msg_write_u32, MsgReader, SizeBuf};
use crate::world::{Object, ObjectKind, Player, World, MAX_OBJECTS, MAX_PLAYERS};

/// Fixed record: id (u16), score (u32), lives (u8, padded to u16), name
/// (8 bytes, zero-padded UTF-8, truncated if longer).
const PLAYER_RECORD_LEN: usize = 2 + 4 + 2 + 8;
/// kind(2) + owner_id(2) + pos.x/y(4*2) + vel.x/y(4*2) + rot(4) + scale.x/y(4*2)
const OBJECT_RECORD_LEN: usize = 2 + 2 + 4 * 7;

pub const SNAPSHOT_LEN: usize =
    4 + 4 + PLAYER_RECORD_LEN * MAX_PLAYERS + 4 + OBJECT_RECORD_LEN * MAX_OBJECTS;

fn write_player(sb: &mut SizeBuf, p: &Player) {
    msg_write_u16(sb, p.id);
    msg_write_u32(sb, p.score);
    msg_write_u16(sb, p.lives as u16);
    let mut name = [0u8; 8];
    let bytes = p.name.as_bytes();
    let n = bytes.len().min(8);
    name[..n].copy_from_slice(&bytes[..n]);
    msg_write_bytes(sb, &name);
}

fn read_player(r: &mut MsgReader) -> Option<Player> {
    let id = r.read_u16()?;
    let score = r.read_u32()?;
    let lives = r.read_u16()? as u8;
    let name_bytes = r.read_bytes(8)?;
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
    let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
    Some(Player {
        id,
        score,
        lives,
        name,
        in_use: true,
    })
}

fn write_object(sb: &mut SizeBuf, o: &Object) {
    msg_write_u16(sb, o.kind as u16);
    msg_write_u16(sb, o.owner_id);
    msg_write_f32(sb, o.pos[0]);
    msg_write_f32(sb, o.pos[1]);
    msg_write_f32(sb, o.vel[0]);
    msg_write_f32(sb, o.vel[1]);
    msg_write_f32(sb, o.rot);
    msg_write_f32(sb, o.scale[0]);
    msg_write_f32(sb, o.scale[1]);
}

fn read_object(r: &mut MsgReader) -> Option<Object> {
    let kind = ObjectKind::from_u16(r.read_u16()?)?;
    let owner_id = r.read_u16()?;
    let pos = [r.read_f32()?, r.read_f32()?];
    let vel = [r.read_f32()?, r.read_f32()?];
    let rot = r.read_f32()?;
    let scale = [r.read_f32()?, r.read_f32()?];
    Some(Object {
        kind,
        owner_id,
        pos,
        vel,
        rot,
        scale,
    })
}

/// Pack the whole world into a fixed-length `SNAPSHOT` payload.
/// Encoders must zero unused player/object slots so the length never
/// varies with occupancy (§4.6).
pub fn encode_snapshot(world: &World) -> Vec<u8> {
    let mut sb = SizeBuf::with_capacity(SNAPSHOT_LEN);
    msg_write_u32(&mut sb, world.world_seq);
    msg_write_u32(&mut sb, world.players.len() as u32);

    for i in 0..MAX_PLAYERS {
        match world.players.get(i) {
            Some(p) => write_player(&mut sb, p),
            None => write_player(
                &mut sb,
                &Player {
                    id: 0,
                    score: 0,
                    lives: 0,
                    name: String::new(),
                    in_use: false,
                },
            ),
        }
    }

    let live_count = world.objects.iter().filter(|o| o.is_live()).count();
    msg_write_u32(&mut sb, live_count as u32);
    for o in world.objects.iter() {
        write_object(&mut sb, o);
    }

    let bytes = sb.into_bytes();
    debug_assert_eq!(bytes.len(), SNAPSHOT_LEN);
    bytes
}

#[derive(Debug, Clone)]
pub struct DecodedSnapshot {
    pub world_seq: u32,
    pub player_count: u32,
    pub players: Vec<Player>,
    pub object_count: u32,
    pub objects: Vec<Object>,
}

/// Decode a `SNAPSHOT` payload. Rejects anything whose length differs
/// from `SNAPSHOT_LEN` (§4.6 "Decoders must reject payloads whose length
/// differs from the expected constant").
pub fn decode_snapshot(payload: &[u8]) -> Option<DecodedSnapshot> {
    if payload.len() != SNAPSHOT_LEN {
        return None;
    }
    let mut r = MsgReader::new(payload);
    let world_seq = r.read_u32()?;
    let player_count = r.read_u32()?;

    let mut players = Vec::with_capacity(MAX_PLAYERS);
    for _ in 0..MAX_PLAYERS {
        players.push(read_player(&mut r)?);
    }

    let object_count = r.read_u32()?;
    let mut objects = Vec::with_capacity(MAX_OBJECTS);
    for _ in 0..MAX_OBJECTS {
        objects.push(read_object(&mut r)?);
    }

    Some(DecodedSnapshot {
        world_seq,
        player_count,
        players,
        object_count,
        objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObjectKind;

    #[test]
    fn encode_is_always_the_fixed_length() {
        let empty = World::new(800.0, 600.0);
        assert_eq!(encode_snapshot(&empty).len(), SNAPSHOT_LEN);

        let mut full = World::new(800.0, 600.0);
        full.players.push(Player::new(1, "alice".into()));
        full.spawn_object(Object {
            kind: ObjectKind::Ship,
            owner_id: 1,
            ..Object::empty()
        });
        assert_eq!(encode_snapshot(&full).len(), SNAPSHOT_LEN);
    }

    #[test]
    fn roundtrip_preserves_populated_fields() {
        let mut world = World::new(800.0, 600.0);
        world.world_seq = 42;
        world.players.push(Player::new(9001, "bob".into()));
        world.spawn_object(Object {
            kind: ObjectKind::Asteroid,
            owner_id: 0,
            pos: [10.0, -5.0],
            vel: [1.0, 2.0],
            rot: 0.5,
            scale: [12.0, 12.0],
        });

        let bytes = encode_snapshot(&world);
        let decoded = decode_snapshot(&bytes).unwrap();

        assert_eq!(decoded.world_seq, 42);
        assert_eq!(decoded.player_count, 1);
        assert_eq!(decoded.players[0].id, 9001);
        assert_eq!(decoded.players[0].name, "bob");
        assert_eq!(decoded.object_count, 1);
        assert_eq!(decoded.objects[0].kind, ObjectKind::Asteroid);
        assert_eq!(decoded.objects[0].pos, [10.0, -5.0]);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(decode_snapshot(&[0u8; 4]).is_none());
        let mut too_long = encode_snapshot(&World::new(800.0, 600.0));
        too_long.push(0);
        assert!(decode_snapshot(&too_long).is_none());
    }
}
