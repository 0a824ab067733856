use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Point3;
use serde::Serialize;

use crate::filter::Classification;
use crate::geom::SolidId;


/// Aggregate statistics of one classification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub num_points: usize,
    pub num_free: usize,
    pub num_obstructed: usize,
    pub num_solids: usize,
    /// Cells per axis of the grid used.
    pub grid_counts: [usize; 3],
    pub step: f64,
    /// Obstructed point count per solid; solids obstructing nothing are absent.
    pub per_solid: BTreeMap<SolidId, usize>,
    /// Wall-clock time of grid build plus classification.
    pub elapsed_secs: f64,
}

impl Summary {
    pub fn from_labels(
        labels: &[Classification],
        num_solids: usize,
        grid_counts: [usize; 3],
        step: f64,
    ) -> Self {
        let mut per_solid = BTreeMap::new();
        for id in labels.iter().filter_map(Classification::obstructing_solid) {
            *per_solid.entry(id).or_insert(0) += 1;
        }
        let num_obstructed = per_solid.values().sum();

        Self {
            num_points: labels.len(),
            num_free: labels.len() - num_obstructed,
            num_obstructed,
            num_solids,
            grid_counts,
            step,
            per_solid,
            elapsed_secs: 0.0,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "  - Points: {}", self.num_points)?;
        writeln!(f, "  - Free: {}", self.num_free)?;
        writeln!(f, "  - Obstructed: {}", self.num_obstructed)?;
        writeln!(f, "  - Solids: {}", self.num_solids)?;
        writeln!(
            f,
            "  - Grid: {} x {} x {} cells of {:.6}",
            self.grid_counts[0], self.grid_counts[1], self.grid_counts[2], self.step
        )?;
        for (id, count) in &self.per_solid {
            writeln!(f, "    - Solid {}: {}", id, count)?;
        }
        write!(f, "  - Time: {:.3}s", self.elapsed_secs)
    }
}

/// Per-point labels, in input order, plus their summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Results {
    pub labels: Vec<Classification>,
    pub summary: Summary,
}

impl Results {
    pub fn new(labels: Vec<Classification>, summary: Summary) -> Self {
        Self { labels, summary }
    }

    /// The points labelled free. `points` must be the classified input.
    pub fn free_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.select(points, true)
    }

    pub fn obstructed_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.select(points, false)
    }

    fn select(&self, points: &[Point3<f64>], free: bool) -> Vec<Point3<f64>> {
        points
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| label.is_free() == free)
            .map(|(p, _)| *p)
            .collect()
    }
}
