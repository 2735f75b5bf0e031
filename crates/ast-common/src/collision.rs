// collision.rs — static and swept AABB intersection tests.
//
// Ported case-for-case from the original CollisionIntersection_RectRect
// (static check first, then per-axis tFirst/tLast tracking keyed on the
// sign of the relative velocity). Only the representation changed: plain
// `[f32; 2]` points instead of an engine-specific vector type, and an
// explicit `dt` parameter instead of a frame-rate-controller global.

pub type Vec2 = [f32; 2];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extent(center: Vec2, half: Vec2) -> Self {
        Self {
            min: [center[0] - half[0], center[1] - half[1]],
            max: [center[0] + half[0], center[1] + half[1]],
        }
    }
}

/// `a.max.x > b.min.x && b.max.x > a.min.x` on both axes (§4.5).
pub fn static_overlap(a: &Aabb, b: &Aabb) -> bool {
    a.max[0] > b.min[0] && a.max[1] > b.min[1] && b.max[0] > a.min[0] && b.max[1] > a.min[1]
}

/// Time-of-first-overlap for two boxes moving at constant velocity over
/// `[0, dt]`. Returns `Some(tFirst)` on collision, `None` otherwise.
/// Symmetric: `swept_overlap(a, va, b, vb, dt) == swept_overlap(b, vb, a, va, dt)`
/// (§8 property 7), since every computation below depends only on
/// `vb_rel = vel_b - vel_a` and the min/max differences, both of which
/// negate consistently when the two boxes are swapped.
pub fn swept_overlap(a: &Aabb, vel_a: Vec2, b: &Aabb, vel_b: Vec2, dt: f32) -> Option<f32> {
    if static_overlap(a, b) {
        return Some(0.0);
    }

    let mut t_first = 0.0f32;
    let mut t_last = dt;
    let vb = [vel_b[0] - vel_a[0], vel_b[1] - vel_a[1]];

    for axis in 0..2 {
        let v = vb[axis];
        let a_min = a.min[axis];
        let a_max = a.max[axis];
        let b_min = b.min[axis];
        let b_max = b.max[axis];

        if v < 0.0 {
            if a_min > b_max {
                return None;
            }
            if a_max < b_min {
                let d_first = a_max - b_min;
                t_first = t_first.max(d_first / v);
            }
            if a_min < b_max {
                let d_last = a_min - b_max;
                t_last = t_last.min(d_last / v);
            }
        } else if v > 0.0 {
            if a_max < b_min {
                return None;
            }
            if a_min > b_max {
                let d_first = a_min - b_max;
                t_first = t_first.max(d_first / v);
            }
            if a_max > b_min {
                let d_last = a_max - b_min;
                t_last = t_last.min(d_last / v);
            }
        } else if a_max < b_min || a_min > b_max {
            return None;
        }

        if t_first > t_last {
            return None;
        }
    }

    Some(t_first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_overlap_detects_intersecting_boxes() {
        let a = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let b = Aabb::new([0.0, 0.0], [16.0, 16.0]);
        assert!(static_overlap(&a, &b));
    }

    #[test]
    fn static_overlap_false_when_disjoint() {
        let a = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let b = Aabb::new([100.0, -8.0], [116.0, 8.0]);
        assert!(!static_overlap(&a, &b));
    }

    #[test]
    fn s4_swept_collision_t_first() {
        // Ship stationary, asteroid closing fast along x (spec §8 S4).
        let ship = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let asteroid = Aabb::new([100.0, -8.0], [116.0, 8.0]);
        let t = swept_overlap(&ship, [0.0, 0.0], &asteroid, [-1000.0, 0.0], 1.0);
        assert!(t.is_some());
        let t = t.unwrap();
        assert!((t - 0.092).abs() < 1e-6, "expected ~0.092, got {t}");
    }

    #[test]
    fn swept_is_symmetric() {
        let a = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let b = Aabb::new([100.0, -8.0], [116.0, 8.0]);
        let va = [0.0, 0.0];
        let vb = [-1000.0, 0.0];

        let forward = swept_overlap(&a, va, &b, vb, 1.0);
        let backward = swept_overlap(&b, vb, &a, va, 1.0);
        assert_eq!(forward, backward);
    }

    #[test]
    fn never_catching_up_misses() {
        let a = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let b = Aabb::new([100.0, -8.0], [116.0, 8.0]);
        // Moving apart, never intersects within dt.
        let t = swept_overlap(&a, [0.0, 0.0], &b, [1000.0, 0.0], 1.0);
        assert_eq!(t, None);
    }

    #[test]
    fn parallel_motion_with_no_axis_separation_does_not_collide() {
        // Equal velocity (vb == 0 on both axes) and boxes already disjoint.
        let a = Aabb::new([-8.0, -8.0], [8.0, 8.0]);
        let b = Aabb::new([100.0, -8.0], [116.0, 8.0]);
        let t = swept_overlap(&a, [5.0, 0.0], &b, [5.0, 0.0], 1.0);
        assert_eq!(t, None);
    }
}
