//! Bounding volume hierarchy over a solid's triangles.
//!
//! The hierarchy is a median-split tree stored in an arena: nodes reference
//! their children by index, and the triangles are reordered in place into one
//! contiguous buffer so that every leaf owns a sub-range of it. Construction is
//! deterministic for a given triangle order.
//!
//! # Key Components
//!
//! - [`Bvh`]: the arena plus the reordered triangle buffer
//! - [`BvhNode`]: bounds plus [`NodeKind`] (leaf range or child indices)
//! - [`build_all`]: parallel construction across many solids

use rayon::prelude::*;
use tracing::debug;

use crate::geom::{Aabb, Ray, Solid, Triangle};
use crate::intersect::{intersect_aabb, intersect_triangle};
use crate::settings::LEAF_TRIANGLE_THRESHOLD;


/// What a node holds: a slice of the triangle buffer, or two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf { start: usize, end: usize },
    Interior { left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BvhNode {
    /// Union of the bounds of every triangle below this node.
    pub bounds: Aabb,
    pub kind: NodeKind,
}

/// Median-split bounding volume hierarchy.
///
/// **Context**: Point classification casts one ray per candidate solid and
/// point, so per-solid ray queries have to be sublinear in the triangle count.
///
/// **How it Works**: Each node takes the axis of greatest extent of its bounds,
/// sorts its triangles by centroid along that axis and hands each half to a
/// child. Nodes with at most [`LEAF_TRIANGLE_THRESHOLD`] triangles stop
/// splitting. Traversal prunes any subtree whose bounds the ray misses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
}

impl Bvh {
    /// Builds a hierarchy, taking ownership of (and reordering) `triangles`.
    pub fn build(mut triangles: Vec<Triangle>) -> Self {
        let mut nodes = Vec::new();
        if !triangles.is_empty() {
            build_node(&mut nodes, &mut triangles, 0);
        }
        debug!(
            triangles = triangles.len(),
            nodes = nodes.len(),
            "built bvh"
        );
        Self { nodes, triangles }
    }

    /// Number of triangles indexed.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in pre-order; index 0 is the root.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Triangles in leaf order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Bounds of the root, or `None` for an empty hierarchy.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.nodes.first().map(|node| &node.bounds)
    }

    /// Counts every triangle the ray crosses in front of its origin.
    pub fn count_hits(&self, ray: &Ray) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut hits = 0;
        let mut stack = Vec::with_capacity(32);
        stack.push(0);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !intersect_aabb(ray, &node.bounds) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    hits += self.triangles[start..end]
                        .iter()
                        .filter(|tri| intersect_triangle(ray, tri).is_some())
                        .count();
                }
                NodeKind::Interior { left, right } => {
                    // left is visited first
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        hits
    }

    /// Even-odd test with the `+Z` ray from `point`.
    pub fn contains_point(&self, point: &nalgebra::Point3<f64>) -> bool {
        self.count_hits(&Ray::up(*point)) % 2 == 1
    }
}

/// Builds one hierarchy per solid, in parallel, preserving order.
pub fn build_all(solids: &[Solid]) -> Vec<Bvh> {
    solids
        .par_iter()
        .map(|solid| Bvh::build(solid.triangles.clone()))
        .collect()
}

fn bounds_of(triangles: &[Triangle]) -> Aabb {
    let mut aabb = Aabb::empty();
    for tri in triangles {
        aabb.expand(&tri.aabb());
    }
    aabb
}

/// Appends the subtree for `triangles` (which start at `offset` in the
/// final buffer) and returns the index of its root.
fn build_node(nodes: &mut Vec<BvhNode>, triangles: &mut [Triangle], offset: usize) -> usize {
    let bounds = bounds_of(triangles);
    let index = nodes.len();

    if triangles.len() <= LEAF_TRIANGLE_THRESHOLD {
        nodes.push(BvhNode {
            bounds,
            kind: NodeKind::Leaf {
                start: offset,
                end: offset + triangles.len(),
            },
        });
        return index;
    }

    // children are patched in once they exist
    nodes.push(BvhNode {
        bounds,
        kind: NodeKind::Interior { left: 0, right: 0 },
    });

    let axis = bounds.longest_axis();
    triangles.sort_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));

    let mid = triangles.len() / 2;
    let (lower, upper) = triangles.split_at_mut(mid);
    let left = build_node(nodes, lower, offset);
    let right = build_node(nodes, upper, offset + mid);

    nodes[index].kind = NodeKind::Interior { left, right };
    index
}
