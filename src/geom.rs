//! Geometric value types shared by the grid, the BVH and the classifier.
//!
//! Everything here is a plain value: solids arrive already reduced to a
//! triangle soup plus a world-space bounding box, and nothing in the core
//! keeps a reference back to whatever host model produced them.
//!
//! # Key Types
//!
//! - [`Aabb`]: axis-aligned bounding box, seeded empty and expanded
//! - [`Triangle`]: three vertices held by value
//! - [`Ray`]: origin plus unit direction
//! - [`Solid`]: an identified, closed triangle mesh with its bounds

use std::fmt;

use geo_types::{Coord, Rect};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};


/// Opaque handle identifying a solid for the duration of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolidId(pub usize);

impl fmt::Display for SolidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// An inverted box that any expansion overwrites.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box enclosing all `points`. Empty input gives [`Aabb::empty`].
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_point(point);
        }
        aabb
    }

    pub fn expand_point(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn expand(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// True once the box has been expanded by at least one point.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Closed containment test.
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Closed overlap test; boxes touching on a face overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Index of the axis (0 = x, 1 = y, 2 = z) with the greatest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.extent();
        if d.x > d.y {
            if d.x > d.z {
                0
            } else {
                2
            }
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Grows the box by `padding` on every side.
    pub fn padded(&self, padding: f64) -> Aabb {
        let pad = Vector3::repeat(padding);
        Aabb::new(self.min - pad, self.max + pad)
    }

    /// Projection of the box onto the XY plane.
    pub fn footprint(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min.x,
                y: self.min.y,
            },
            Coord {
                x: self.max.x,
                y: self.max.y,
            },
        )
    }
}

/// A triangle held by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&[self.v0, self.v1, self.v2])
    }

    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }
}

/// Half-line with a unit-length direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Creates a ray, normalizing `direction`.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Result<Self> {
        let norm = direction.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Err(Error::DegenerateRay);
        }
        Ok(Self {
            origin,
            direction: direction / norm,
        })
    }

    /// The fixed `+Z` ray used for parity classification.
    pub fn up(origin: Point3<f64>) -> Self {
        Self {
            origin,
            direction: Vector3::z(),
        }
    }

}

/// A closed triangle mesh with its world-space bounds.
///
/// Produced by a [`Tessellation`](crate::tessellate::Tessellation) and never
/// mutated by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    pub id: SolidId,
    pub name: Option<String>,
    pub triangles: Vec<Triangle>,
    pub bounds: Aabb,
}

impl Solid {
    /// Creates a solid from externally supplied mesh and bounds.
    pub fn new(id: SolidId, triangles: Vec<Triangle>, bounds: Aabb) -> Self {
        Self {
            id,
            name: None,
            triangles,
            bounds,
        }
    }

    /// Creates a solid whose bounds are derived from its triangles.
    pub fn from_triangles(id: SolidId, triangles: Vec<Triangle>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(Error::EmptySolid { id });
        }
        let mut bounds = Aabb::empty();
        for tri in &triangles {
            bounds.expand(&tri.aabb());
        }
        Ok(Self::new(id, triangles, bounds))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Axis-aligned box mesh.
    ///
    /// Each face is fanned into four triangles from an off-centre apex, so
    /// face centres do not fall on a triangle edge. Lines through the apex or
    /// along a fan edge still meet shared edges and are subject to the
    /// classification limit described in [`crate::filter`].
    pub fn cuboid(id: SolidId, min: Point3<f64>, max: Point3<f64>) -> Self {
        const APEX: (f64, f64) = (0.4, 0.7);

        let mut triangles = Vec::with_capacity(24);
        for axis in 0..3 {
            let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
            for side in [min[axis], max[axis]] {
                let at = |u: f64, v: f64| {
                    let mut p = Point3::origin();
                    p[axis] = side;
                    p[a] = min[a] + u * (max[a] - min[a]);
                    p[b] = min[b] + v * (max[b] - min[b]);
                    p
                };
                let apex = at(APEX.0, APEX.1);
                let ring = [at(0.0, 0.0), at(1.0, 0.0), at(1.0, 1.0), at(0.0, 1.0)];
                for n in 0..4 {
                    triangles.push(Triangle::new(apex, ring[n], ring[(n + 1) % 4]));
                }
            }
        }
        Self::new(id, triangles, Aabb::new(min, max))
    }
}
