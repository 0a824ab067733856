//! Uniform spatial grid with a per-cell 2D index of solid footprints.
//!
//! The grid partitions a box-shaped region into cubic cells of edge `step`.
//! Every cell is allocated up front, so a lookup by [`CellIndex`] is always
//! defined. A solid is registered in every cell its bounding box overlaps,
//! keyed by the XY projection of that box; a point query then asks only the
//! point's own cell which footprints contain `(x, y)`.
//!
//! Construction is split in two phases. [`GridBuilder`] accepts insertions;
//! [`GridBuilder::build`] bulk-loads every cell's R-tree and returns the
//! immutable [`Grid`], which is the only type that answers queries.
//!
//! Points outside the region are clamped to the nearest border cell rather
//! than rejected.

use std::ops::Index;

use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::geom::{Aabb, Solid, SolidId};
use crate::settings::MAX_GRID_CELLS;


/// Footprint entry: XY projection of a solid's bounds tagged with its id.
pub type Footprint = GeomWithData<Rectangle<[f64; 2]>, SolidId>;

/// Integer coordinates of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl CellIndex {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

/// Placement and extents of the grid, shared by both construction phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    origin: Point3<f64>,
    step: f64,
    counts: [usize; 3],
}

impl GridLayout {
    fn new(step: f64, region: &Aabb) -> Result<Self> {
        if !(step > 0.0 && step.is_finite()) {
            return Err(Error::InvalidStep { step });
        }

        let extent = region.extent();
        let mut cells = [0.0f64; 3];
        for axis in 0..3 {
            let d = extent[axis];
            if !(d > 0.0 && d.is_finite()) {
                return Err(Error::DegenerateRegion {
                    details: format!("extent {} along axis {}", d, axis),
                });
            }
            cells[axis] = (d / step).ceil().max(1.0);
        }

        let total: f64 = cells.iter().product();
        if total > MAX_GRID_CELLS as f64 {
            return Err(Error::DegenerateRegion {
                details: format!(
                    "{:?} cells exceed the limit of {}",
                    cells, MAX_GRID_CELLS
                ),
            });
        }
        // in range after the check above
        let counts = cells.map(|n| n as usize);

        Ok(Self {
            origin: region.min,
            step,
            counts,
        })
    }

    /// `[iCount, jCount, kCount]`.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    pub fn cell_count(&self) -> usize {
        self.counts.iter().product()
    }

    fn axis_index(&self, value: f64, axis: usize) -> usize {
        let raw = ((value - self.origin[axis]) / self.step).floor();
        let last = self.counts[axis] - 1;
        if raw <= 0.0 {
            0
        } else {
            // saturating cast; NaN lands on 0
            (raw as usize).min(last)
        }
    }

    /// Cell holding `point`, clamped into the grid on every axis.
    pub fn hash_point_to_cell(&self, point: &Point3<f64>) -> CellIndex {
        let idx = CellIndex::new(
            self.axis_index(point.x, 0),
            self.axis_index(point.y, 1),
            self.axis_index(point.z, 2),
        );
        if tracing::enabled!(tracing::Level::TRACE) && !self.region().contains_point(point) {
            trace!(?point, ?idx, "point outside grid clamped to border cell");
        }
        idx
    }

    /// Inclusive range of cells covered by `aabb`, clamped into the grid.
    pub fn cell_range(&self, aabb: &Aabb) -> (CellIndex, CellIndex) {
        (
            self.hash_point_to_cell(&aabb.min),
            self.hash_point_to_cell(&aabb.max),
        )
    }

    /// Spatial extent of a cell.
    pub fn cell_bounds(&self, idx: CellIndex) -> Aabb {
        let min = self.origin
            + Vector3::new(idx.i as f64, idx.j as f64, idx.k as f64) * self.step;
        Aabb::new(min, min + Vector3::repeat(self.step))
    }

    /// Region actually covered by the cells (may exceed the requested one).
    pub fn region(&self) -> Aabb {
        let extent = Vector3::new(
            self.counts[0] as f64,
            self.counts[1] as f64,
            self.counts[2] as f64,
        ) * self.step;
        Aabb::new(self.origin, self.origin + extent)
    }

    fn linear(&self, idx: CellIndex) -> usize {
        (idx.i * self.counts[1] + idx.j) * self.counts[2] + idx.k
    }

    fn contains_index(&self, idx: CellIndex) -> bool {
        idx.i < self.counts[0] && idx.j < self.counts[1] && idx.k < self.counts[2]
    }

    fn index_of(&self, linear: usize) -> CellIndex {
        let k = linear % self.counts[2];
        let rest = linear / self.counts[2];
        CellIndex::new(rest / self.counts[1], rest % self.counts[1], k)
    }
}

/// Insertion phase of a [`Grid`].
#[derive(Debug, Clone)]
pub struct GridBuilder {
    layout: GridLayout,
    pending: Vec<Vec<Footprint>>,
}

impl GridBuilder {
    /// Lays out `ceil(extent / step)` cells per axis over `region` and
    /// allocates every one of them.
    pub fn new(step: f64, region: &Aabb) -> Result<Self> {
        let layout = GridLayout::new(step, region)?;
        debug!(counts = ?layout.counts, step, "allocating grid");
        Ok(Self {
            pending: vec![Vec::new(); layout.cell_count()],
            layout,
        })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn hash_point_to_cell(&self, point: &Point3<f64>) -> CellIndex {
        self.layout.hash_point_to_cell(point)
    }

    /// Registers the solid's footprint in every cell its bounds cover.
    pub fn insert(&mut self, solid: &Solid) {
        let rect = solid.bounds.footprint();
        let entry = Footprint::new(
            Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            solid.id,
        );

        let (lo, hi) = self.layout.cell_range(&solid.bounds);
        for (i, j, k) in iproduct!(lo.i..=hi.i, lo.j..=hi.j, lo.k..=hi.k) {
            let linear = self.layout.linear(CellIndex::new(i, j, k));
            self.pending[linear].push(entry.clone());
        }
    }

    pub fn insert_all<'a>(&mut self, solids: impl IntoIterator<Item = &'a Solid>) {
        for solid in solids {
            self.insert(solid);
        }
    }

    /// Bulk-loads every cell's index. No insertion is possible afterwards.
    pub fn build(self) -> Grid {
        let entries: usize = self.pending.iter().map(Vec::len).sum();
        let cells: Vec<Cell> = self
            .pending
            .into_par_iter()
            .map(|footprints| Cell {
                tree: RTree::bulk_load(footprints),
            })
            .collect();

        info!(
            cells = cells.len(),
            occupied = cells.iter().filter(|c| !c.is_empty()).count(),
            entries,
            "grid built"
        );

        Grid {
            layout: self.layout,
            cells,
        }
    }
}

/// One grid cell: an R-tree over the footprints of overlapping solids.
#[derive(Debug, Clone)]
pub struct Cell {
    tree: RTree<Footprint>,
}

impl Cell {
    /// Solids whose footprint contains `(x, y)` (boundary inclusive).
    pub fn query(&self, x: f64, y: f64) -> impl Iterator<Item = SolidId> + '_ {
        self.tree
            .locate_all_at_point(&[x, y])
            .map(|footprint| footprint.data)
    }

    pub fn contains(&self, id: SolidId) -> bool {
        self.tree.iter().any(|footprint| footprint.data == id)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Immutable, fully indexed spatial grid.
#[derive(Debug, Clone)]
pub struct Grid {
    layout: GridLayout,
    cells: Vec<Cell>,
}

impl Grid {
    /// Builds a grid over `region` and inserts every solid.
    pub fn from_solids(step: f64, region: &Aabb, solids: &[Solid]) -> Result<Self> {
        let mut builder = GridBuilder::new(step, region)?;
        builder.insert_all(solids);
        Ok(builder.build())
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn hash_point_to_cell(&self, point: &Point3<f64>) -> CellIndex {
        self.layout.hash_point_to_cell(point)
    }

    pub fn get(&self, idx: CellIndex) -> Option<&Cell> {
        self.layout
            .contains_index(idx)
            .then(|| &self.cells[self.layout.linear(idx)])
    }

    /// All cells with their indices, `k` varying fastest.
    pub fn cells(&self) -> impl Iterator<Item = (CellIndex, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(linear, cell)| (self.layout.index_of(linear), cell))
    }

    /// Candidate solids for `point`: footprints containing it in its own cell.
    pub fn candidates(&self, point: &Point3<f64>) -> impl Iterator<Item = SolidId> + '_ {
        let idx = self.hash_point_to_cell(point);
        self[idx].query(point.x, point.y)
    }
}

impl Index<CellIndex> for Grid {
    type Output = Cell;

    fn index(&self, idx: CellIndex) -> &Cell {
        &self.cells[self.layout.linear(idx)]
    }
}

/// Union of the solids' bounds and the points, grown by `padding`.
///
/// Axes left without extent are widened to one `step`, so the result can
/// always seed a grid. Returns `None` when there is nothing to cover.
pub fn region_for(solids: &[Solid], points: &[Point3<f64>], padding: f64, step: f64) -> Option<Aabb> {
    let mut region = Aabb::from_points(points);
    for solid in solids {
        region.expand(&solid.bounds);
    }
    if !region.is_valid() {
        return None;
    }

    let mut region = region.padded(padding);
    for axis in 0..3 {
        if region.max[axis] - region.min[axis] <= 0.0 {
            region.min[axis] -= step / 2.0;
            region.max[axis] += step / 2.0;
        }
    }
    Some(region)
}
