//! Point classification against indexed solids.
//!
//! A point is tested only against the solids whose footprint contains it in
//! its own grid cell. For each such candidate a `+Z` ray is cast through the
//! solid's BVH and the crossings are counted: an odd count means the point is
//! inside (even-odd rule, valid for closed meshes). The first solid that
//! contains the point decides; a point no candidate contains is free.
//!
//! Parity is only reliable when the ray crosses the surface through triangle
//! interiors. The triangle test accepts hits on the closed triangle, so a ray
//! passing exactly through an edge or vertex shared by several triangles is
//! counted once per triangle. This affects every point whose vertical line
//! meets a shared edge, not just points on the surface: a box whose top and
//! bottom faces are split along the same diagonal reports every point above
//! that diagonal as free. The result is deterministic for a given input.

use std::collections::HashMap;

use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bvh::{self, Bvh};
use crate::error::{Error, Result};
use crate::geom::{Solid, SolidId};
use crate::grid::Grid;


/// Label assigned to a query point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Free,
    /// Inside the given solid (the first candidate found to contain it).
    Obstructed(SolidId),
}

impl Classification {
    pub fn is_free(&self) -> bool {
        matches!(self, Classification::Free)
    }

    pub fn obstructing_solid(&self) -> Option<SolidId> {
        match self {
            Classification::Free => None,
            Classification::Obstructed(id) => Some(*id),
        }
    }
}

/// Classifier over a built grid and the solids it indexes.
///
/// **Context**: The grid answers "which solids might contain this point"
/// cheaply but over-approximately; the exact answer needs a ray cast against
/// each candidate's mesh.
///
/// **How it Works**: Construction builds one BVH per solid (in parallel) and
/// maps solid ids to them. After that everything is read-only, so points are
/// classified independently and may be processed on any number of threads.
#[derive(Debug)]
pub struct PointFilter<'a> {
    grid: &'a Grid,
    bvhs: Vec<Bvh>,
    by_id: HashMap<SolidId, usize>,
}

impl<'a> PointFilter<'a> {
    /// Builds every solid's BVH and the id lookup.
    ///
    /// Solids must have distinct ids. Candidates reported by the grid whose
    /// id is not among `solids` are ignored.
    pub fn new(grid: &'a Grid, solids: &[Solid]) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(solids.len());
        for (index, solid) in solids.iter().enumerate() {
            if by_id.insert(solid.id, index).is_some() {
                return Err(Error::DuplicateSolid { id: solid.id });
            }
        }

        let bvhs = bvh::build_all(solids);
        debug!(
            solids = solids.len(),
            triangles = bvhs.iter().map(Bvh::len).sum::<usize>(),
            "built solid hierarchies"
        );

        Ok(Self { grid, bvhs, by_id })
    }

    pub fn bvh(&self, id: SolidId) -> Option<&Bvh> {
        self.by_id.get(&id).map(|&index| &self.bvhs[index])
    }

    /// Classifies one point.
    ///
    /// Subject to the shared-edge limit described in the module docs: a `+Z`
    /// ray through an edge or vertex shared by adjacent triangles can flip the
    /// label.
    pub fn classify(&self, point: &Point3<f64>) -> Classification {
        for id in self.grid.candidates(point) {
            let Some(bvh) = self.bvh(id) else {
                trace!(%id, "candidate not known to the filter");
                continue;
            };
            if bvh.contains_point(point) {
                return Classification::Obstructed(id);
            }
        }
        Classification::Free
    }

    /// Classifies every point in parallel; output order matches input order.
    pub fn classify_all(&self, points: &[Point3<f64>]) -> Vec<Classification> {
        points.par_iter().map(|p| self.classify(p)).collect()
    }

    pub fn classify_all_serial(&self, points: &[Point3<f64>]) -> Vec<Classification> {
        points.iter().map(|p| self.classify(p)).collect()
    }

    /// The points classified free, in input order.
    pub fn filter_free(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points
            .iter()
            .zip(self.classify_all(points))
            .filter(|(_, label)| label.is_free())
            .map(|(p, _)| *p)
            .collect()
    }
}

/// One-shot classification: builds the BVHs, keeps the free points.
pub fn filter_free(points: &[Point3<f64>], grid: &Grid, solids: &[Solid]) -> Result<Vec<Point3<f64>>> {
    Ok(PointFilter::new(grid, solids)?.filter_free(points))
}
