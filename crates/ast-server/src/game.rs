// game.rs — fixed-dt tick engine (§4.4).
//
// The collision pass is shaped like the teacher's SV_CalcPings /
// SV_CheckTimeouts split in sv_main.rs: a read-only parallel scan builds
// candidate results, then a sequential pass applies them against the one
// mutable `World`. With MAX_OBJECTS capped at 40 the parallel scan buys
// little on its own, but it keeps collision arbitration lock-free and
// mirrors the phase split used everywhere else collision-like scans
// happen in this codebase.

use rand::Rng;
use rayon::prelude::*;

use ast_common::collision::{swept_overlap, Aabb};
use ast_common::input::Action;
use ast_common::world::{Object, ObjectKind, World, MAX_OBJECTS};

pub const ROT_SPEED: f32 = 3.0;
pub const ACCEL_FWD: f32 = 200.0;
pub const MAX_FWD: f32 = 300.0;
pub const ACCEL_BACK: f32 = 150.0;
pub const MAX_BACK: f32 = 150.0;
pub const BULLET_SPEED: f32 = 500.0;
pub const BULLET_SCALE: [f32; 2] = [5.0, 5.0];
pub const ASTEROID_SCORE: u32 = 100;
pub const GAME_OVER_SECONDS: u64 = 180;
pub const SHIP_SCALE: [f32; 2] = [8.0, 8.0];
pub const INITIAL_ASTEROIDS: usize = 6;
const ASTEROID_SCALE_RANGE: std::ops::Range<f32> = 8.0..24.0;
const ASTEROID_SPEED_RANGE: std::ops::Range<f32> = 20.0..80.0;
const OFFWORLD: f32 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    GameOver,
}

/// Owns the countdown timer; everything else the tick touches lives in
/// `World` so the game-loop thread only ever needs the world mutex.
pub struct GameEngine {
    countdown_ms: i64,
    game_over: bool,
}

impl GameEngine {
    pub fn new() -> Self {
        Self {
            countdown_ms: (GAME_OVER_SECONDS * 1000) as i64,
            game_over: false,
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Run one fixed-dt tick (§4.4 items 1-6, sans the snapshot send
    /// itself, which the caller does once this returns `Running`).
    pub fn tick(&mut self, world: &mut World, dt: f32) -> TickOutcome {
        if self.game_over {
            return TickOutcome::GameOver;
        }

        consume_input(world, dt);
        integrate(world, dt);
        free_out_of_bounds_bullets(world);
        resolve_collisions(world, dt);

        self.countdown_ms -= (dt * 1000.0) as i64;
        if self.countdown_ms <= 0 {
            self.game_over = true;
            return TickOutcome::GameOver;
        }

        world.world_seq += 1;
        TickOutcome::Running
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn ship_index_for(world: &World, player_id: u16) -> Option<usize> {
    world.objects.iter().position(|o| {
        o.is_live() && matches!(o.kind, ObjectKind::Ship) && o.owner_id == player_id
    })
}

fn consume_input(world: &mut World, dt: f32) {
    let player_ids: Vec<u16> = world.players.iter().map(|p| p.id).collect();
    let mut spawns = Vec::new();

    for id in player_ids {
        let Some(mut latch) = world.input.get(&id).copied() else {
            continue;
        };
        let fire_edge = latch.take_fire_edge();
        world.input.insert(id, latch);

        let Some(idx) = ship_index_for(world, id) else {
            continue;
        };

        let ship = &mut world.objects[idx];
        if latch.left {
            ship.rot += ROT_SPEED * dt;
        }
        if latch.right {
            ship.rot -= ROT_SPEED * dt;
        }
        let forward = [ship.rot.cos(), ship.rot.sin()];

        if latch.up {
            ship.vel[0] += forward[0] * ACCEL_FWD * dt;
            ship.vel[1] += forward[1] * ACCEL_FWD * dt;
            clamp_magnitude(&mut ship.vel, MAX_FWD);
        }
        if latch.down {
            ship.vel[0] -= forward[0] * ACCEL_BACK * dt;
            ship.vel[1] -= forward[1] * ACCEL_BACK * dt;
            clamp_magnitude(&mut ship.vel, MAX_BACK);
        }

        if fire_edge {
            spawns.push(Object {
                kind: ObjectKind::Bullet,
                owner_id: id,
                pos: ship.pos,
                vel: [forward[0] * BULLET_SPEED, forward[1] * BULLET_SPEED],
                rot: ship.rot,
                scale: BULLET_SCALE,
            });
        }
    }

    for obj in spawns {
        world.spawn_object(obj);
    }
}

fn clamp_magnitude(v: &mut [f32; 2], max: f32) {
    let mag = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if mag > max && mag > 0.0 {
        let scale = max / mag;
        v[0] *= scale;
        v[1] *= scale;
    }
}

/// `pos += vel * dt` for every live object, then ships and asteroids wrap
/// toroidally to the world rectangle. Bullets are left unwrapped: they
/// are freed instead once they leave the rectangle (§4.4 item 3).
fn integrate(world: &mut World, dt: f32) {
    let half_w = world.width / 2.0;
    let half_h = world.height / 2.0;

    for obj in world.objects.iter_mut() {
        if !obj.is_live() {
            continue;
        }
        obj.pos[0] += obj.vel[0] * dt;
        obj.pos[1] += obj.vel[1] * dt;

        if matches!(obj.kind, ObjectKind::Bullet) {
            continue;
        }

        let wrap_w = world.width + 2.0 * obj.scale[0];
        let wrap_h = world.height + 2.0 * obj.scale[1];
        let max_x = half_w + obj.scale[0];
        let max_y = half_h + obj.scale[1];

        if obj.pos[0] > max_x {
            obj.pos[0] -= wrap_w;
        } else if obj.pos[0] < -max_x {
            obj.pos[0] += wrap_w;
        }
        if obj.pos[1] > max_y {
            obj.pos[1] -= wrap_h;
        } else if obj.pos[1] < -max_y {
            obj.pos[1] += wrap_h;
        }
    }
}

fn free_out_of_bounds_bullets(world: &mut World) {
    let half_w = world.width / 2.0;
    let half_h = world.height / 2.0;

    for obj in world.objects.iter_mut() {
        if !obj.is_live() || !matches!(obj.kind, ObjectKind::Bullet) {
            continue;
        }
        let max_x = half_w + obj.scale[0];
        let max_y = half_h + obj.scale[1];
        if obj.pos[0].abs() > max_x || obj.pos[1].abs() > max_y {
            obj.kind = ObjectKind::None;
        }
    }
}

fn aabb_of(obj: &Object) -> Aabb {
    Aabb::from_center_half_extent(obj.pos, obj.scale)
}

enum Hit {
    Bullet { bullet_idx: usize },
    Ship { ship_idx: usize },
}

fn resolve_collisions(world: &mut World, dt: f32) {
    let asteroid_idxs: Vec<usize> = world
        .objects
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_live() && matches!(o.kind, ObjectKind::Asteroid))
        .map(|(i, _)| i)
        .collect();

    let objects_snapshot: Vec<Object> = world.objects.to_vec();

    // Phase 1: read-only, find each asteroid's first hit this tick
    // (minimum tFirst, ties broken by earliest table index per §4.5).
    let hits: Vec<Option<(usize, usize, f32)>> = asteroid_idxs
        .par_iter()
        .map(|&ai| {
            let a = aabb_of(&objects_snapshot[ai]);
            let va = objects_snapshot[ai].vel;
            let mut best: Option<(usize, f32)> = None;

            for (oi, other) in objects_snapshot.iter().enumerate() {
                if oi == ai || !other.is_live() || matches!(other.kind, ObjectKind::Asteroid) {
                    continue;
                }
                let b = aabb_of(other);
                if let Some(t) = swept_overlap(&a, va, &b, other.vel, dt) {
                    match best {
                        Some((_, best_t)) if t >= best_t => {}
                        _ => best = Some((oi, t)),
                    }
                }
            }
            best.map(|(oi, t)| (ai, oi, t))
        })
        .collect();

    // Phase 2: sequential application.
    for hit in hits.into_iter().flatten() {
        let (asteroid_idx, other_idx, _t) = hit;
        if !world.objects[asteroid_idx].is_live() || !world.objects[other_idx].is_live() {
            continue;
        }
        let kind = world.objects[other_idx].kind;

        let outcome = match kind {
            ObjectKind::Bullet => Some(Hit::Bullet { bullet_idx: other_idx }),
            ObjectKind::Ship => Some(Hit::Ship { ship_idx: other_idx }),
            _ => None,
        };

        match outcome {
            Some(Hit::Bullet { bullet_idx }) => {
                let owner = world.objects[bullet_idx].owner_id;
                if let Some(p) = world.player_mut(owner) {
                    p.score += ASTEROID_SCORE;
                }
                world.objects[bullet_idx].kind = ObjectKind::None;
                reseed_asteroid(world, asteroid_idx);
            }
            Some(Hit::Ship { ship_idx }) => {
                let owner = world.objects[ship_idx].owner_id;
                let mut hide = false;
                if let Some(p) = world.player_mut(owner) {
                    p.lives = p.lives.saturating_sub(1);
                    hide = p.lives == 0;
                }
                let ship = &mut world.objects[ship_idx];
                ship.pos = [0.0, 0.0];
                ship.vel = [0.0, 0.0];
                ship.rot = 0.0;
                if hide {
                    ship.pos = [OFFWORLD, OFFWORLD];
                }
            }
            None => {}
        }
    }
}

fn reseed_asteroid(world: &mut World, idx: usize) {
    let mut rng = rand::thread_rng();
    let scale = rng.gen_range(ASTEROID_SCALE_RANGE);
    let speed = rng.gen_range(ASTEROID_SPEED_RANGE);
    let heading: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
    let pos = world.objects[idx].pos;
    world.objects[idx] = Object {
        kind: ObjectKind::Asteroid,
        owner_id: 0,
        pos,
        vel: [heading.cos() * speed, heading.sin() * speed],
        rot: 0.0,
        scale: [scale, scale],
    };
}

/// Spawns a `Ship` for a peer newly promoted to `InGame` (§4.3, §4.4 item
/// 1 — there is no input to apply without a ship object in the table).
/// Does nothing if the player already has a live ship (idempotent under
/// `RSP_GAME_START` retransmission).
pub fn spawn_ship(world: &mut World, player_id: u16) -> Option<usize> {
    if ship_index_for(world, player_id).is_some() {
        return None;
    }
    world.spawn_object(Object {
        kind: ObjectKind::Ship,
        owner_id: player_id,
        pos: [0.0, 0.0],
        vel: [0.0, 0.0],
        rot: 0.0,
        scale: SHIP_SCALE,
    })
}

/// Populates the object table with `count` asteroids scattered around the
/// world rectangle, each clear of the origin where ships spawn. Called
/// once, the tick a game actually begins (§4.4: the object table must
/// hold something other than ships for collisions to ever fire).
pub fn seed_asteroids(world: &mut World, count: usize) {
    let mut rng = rand::thread_rng();
    let half_w = world.width / 2.0;
    let half_h = world.height / 2.0;
    for _ in 0..count {
        let scale = rng.gen_range(ASTEROID_SCALE_RANGE);
        let speed = rng.gen_range(ASTEROID_SPEED_RANGE);
        let heading: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
        // Keep well clear of the ship spawn point at the origin.
        let radius = rng.gen_range(0.5f32..1.0) * half_w.min(half_h);
        let angle: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
        let pos = [angle.cos() * radius, angle.sin() * radius];
        world.spawn_object(Object {
            kind: ObjectKind::Asteroid,
            owner_id: 0,
            pos,
            vel: [heading.cos() * speed, heading.sin() * speed],
            rot: 0.0,
            scale: [scale, scale],
        });
    }
}

/// §4.7: `INPUT` from a peer not `InGame` is dropped upstream; this
/// applies a single action for one already-admitted peer.
pub fn apply_input(world: &mut World, player_id: u16, action: Action) {
    world.input.entry(player_id).or_default().apply(action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_common::world::Player;

    fn ship(id: u16, pos: [f32; 2]) -> Object {
        Object {
            kind: ObjectKind::Ship,
            owner_id: id,
            pos,
            vel: [0.0, 0.0],
            rot: 0.0,
            scale: [8.0, 8.0],
        }
    }

    #[test]
    fn no_input_only_integrates_existing_velocity() {
        let mut world = World::new(800.0, 600.0);
        world.players.push(Player::new(1, "a".into()));
        let idx = world.spawn_object(ship(1, [0.0, 0.0])).unwrap();
        world.objects[idx].vel = [10.0, 0.0];

        let mut engine = GameEngine::new();
        engine.tick(&mut world, 1.0);

        assert!((world.objects[idx].pos[0] - 10.0).abs() < 1e-4);
        assert_eq!(world.objects[idx].vel, [10.0, 0.0]);
    }

    #[test]
    fn fire_edge_spawns_one_bullet() {
        let mut world = World::new(800.0, 600.0);
        world.players.push(Player::new(1, "a".into()));
        world.spawn_object(ship(1, [0.0, 0.0])).unwrap();
        apply_input(&mut world, 1, Action::Fire);

        let mut engine = GameEngine::new();
        engine.tick(&mut world, 0.1);

        let bullets = world
            .objects
            .iter()
            .filter(|o| matches!(o.kind, ObjectKind::Bullet))
            .count();
        assert_eq!(bullets, 1);
    }

    #[test]
    fn bullet_asteroid_collision_awards_score_and_reseeds() {
        // s5: a bullet already on a collision course with an asteroid.
        let mut world = World::new(800.0, 600.0);
        world.players.push(Player::new(1, "p".into()));
        world
            .spawn_object(Object {
                kind: ObjectKind::Bullet,
                owner_id: 1,
                pos: [-8.0, 0.0],
                vel: [0.0, 0.0],
                rot: 0.0,
                scale: [5.0, 5.0],
            })
            .unwrap();
        let ast_idx = world
            .spawn_object(Object {
                kind: ObjectKind::Asteroid,
                owner_id: 0,
                pos: [100.0, 0.0],
                vel: [-1000.0, 0.0],
                rot: 0.0,
                scale: [8.0, 8.0],
            })
            .unwrap();

        let mut engine = GameEngine::new();
        engine.tick(&mut world, 1.0);

        assert_eq!(world.player(1).unwrap().score, 100);
        assert!(world.objects[ast_idx].is_live());
        let bullets_alive = world
            .objects
            .iter()
            .filter(|o| matches!(o.kind, ObjectKind::Bullet))
            .count();
        assert_eq!(bullets_alive, 0);
    }

    #[test]
    fn ship_asteroid_collision_costs_a_life_and_resets_position() {
        let mut world = World::new(800.0, 600.0);
        world.players.push(Player::new(1, "p".into()));
        let ship_idx = world.spawn_object(ship(1, [50.0, 0.0])).unwrap();
        world
            .spawn_object(Object {
                kind: ObjectKind::Asteroid,
                owner_id: 0,
                pos: [50.0, 0.0],
                vel: [0.0, 0.0],
                rot: 0.0,
                scale: [8.0, 8.0],
            })
            .unwrap();

        let mut engine = GameEngine::new();
        engine.tick(&mut world, 1.0);

        assert_eq!(world.player(1).unwrap().lives, 2);
        assert_eq!(world.objects[ship_idx].pos, [0.0, 0.0]);
    }

    #[test]
    fn countdown_reaching_zero_reports_game_over() {
        let mut world = World::new(800.0, 600.0);
        let mut engine = GameEngine::new();
        let mut outcome = TickOutcome::Running;
        for _ in 0..(GAME_OVER_SECONDS + 1) {
            outcome = engine.tick(&mut world, 1.0);
            if outcome == TickOutcome::GameOver {
                break;
            }
        }
        assert_eq!(outcome, TickOutcome::GameOver);
        assert!(engine.is_game_over());
    }
}
