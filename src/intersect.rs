//! Ray intersection primitives.
//!
//! A ray lying in a triangle's plane is a miss rather than a tangency, and
//! hits at or behind the origin are discarded. Hits on a triangle's edges and
//! vertices are accepted (`u`, `v` and `u + v` tested against closed bounds),
//! so a ray through an edge shared by two triangles hits both of them.

use crate::geom::{Aabb, Ray, Triangle};
use crate::settings::INTERSECT_EPSILON;


/// Möller–Trumbore ray/triangle test.
///
/// Returns the ray parameter `t` of the hit. Rays parallel to the triangle's
/// plane (`|det| < ε`) miss, as do hits with `t <= ε`.
pub fn intersect_triangle(ray: &Ray, tri: &Triangle) -> Option<f64> {
    let e1 = tri.v1 - tri.v0;
    let e2 = tri.v2 - tri.v0;
    let p = ray.direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < INTERSECT_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - tri.v0;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&q) * inv_det;
    (t > INTERSECT_EPSILON).then_some(t)
}

/// Slab test between a ray and a box.
///
/// A zero direction component contributes an unbounded interval when the
/// origin lies inside that slab and rejects outright otherwise, so no NaN ever
/// reaches the interval comparisons. Boxes entirely behind the origin miss.
pub fn intersect_aabb(ray: &Ray, aabb: &Aabb) -> bool {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if dir == 0.0 {
            if origin < lo || origin > hi {
                return false;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let (mut t0, mut t1) = ((lo - origin) * inv, (hi - origin) * inv);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return false;
        }
    }

    t_far >= 0.0
}
