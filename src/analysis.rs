//! End-to-end classification runs.
//!
//! An [`Analysis`] owns the configuration, the solids and the query points of
//! one run. It derives (or takes) the region, builds the grid, classifies every
//! point and writes the results out.
//!
//! # Key Features
//!
//! - [`Analysis::new`]: loads solids and points named by the settings
//! - [`Analysis::run`]: grid build and classification, parallel with a
//!   progress bar or serial
//! - [`Analysis::writeup`]: free points, optional labels and a JSON summary

use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::filter::{Classification, PointFilter};
use crate::geom::{Aabb, Solid};
use crate::grid::{self, GridBuilder};
use crate::output;
use crate::points::load_points;
use crate::result::{Results, Summary};
use crate::settings::Settings;
use crate::tessellate::{ObjFile, Tessellation};

#[cfg(test)]
mod tests {

    use super::*;
    use crate::geom::SolidId;
    use crate::settings::{load_default_config, Region};

    fn cube(id: usize, min: [f64; 3], max: [f64; 3]) -> Solid {
        Solid::cuboid(SolidId(id), Point3::from(min), Point3::from(max))
    }

    #[test]
    fn derived_region_covers_everything() {
        let settings = load_default_config().unwrap();
        let analysis = Analysis::from_parts(
            settings,
            vec![cube(0, [2.0, 2.0, 2.0], [4.0, 4.0, 4.0])],
            vec![Point3::new(9.0, 9.0, 9.0)],
        );
        let region = analysis.region().unwrap();
        assert!(region.contains_point(&Point3::new(2.0, 2.0, 2.0)));
        assert!(region.contains_point(&Point3::new(9.0, 9.0, 9.0)));
    }

    #[test]
    fn configured_region_wins() {
        let mut settings = load_default_config().unwrap();
        settings.region = Some(Region {
            min: [-1.0, -1.0, -1.0],
            max: [1.0, 1.0, 1.0],
        });
        let analysis = Analysis::from_parts(settings, Vec::new(), vec![Point3::new(5.0, 5.0, 5.0)]);
        let region = analysis.region().unwrap();
        assert_eq!(region.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn run_labels_every_point() {
        let mut settings = load_default_config().unwrap();
        settings.progress = false;
        let mut analysis = Analysis::from_parts(
            settings,
            vec![cube(0, [2.0, 2.0, 2.0], [4.0, 4.0, 4.0])],
            vec![
                Point3::new(3.0, 3.0, 3.0),
                Point3::new(9.0, 9.0, 9.0),
                Point3::new(3.0, 3.0, 0.0),
            ],
        );
        let results = analysis.run().unwrap();
        assert_eq!(
            results.labels,
            vec![
                Classification::Obstructed(SolidId(0)),
                Classification::Free,
                Classification::Free
            ]
        );
        assert_eq!(results.summary.num_free, 2);
        assert_eq!(results.summary.num_solids, 1);
    }

    #[test]
    fn serial_run_matches_parallel() {
        let mut settings = load_default_config().unwrap();
        settings.progress = false;
        settings.step = 0.75;
        let solids = vec![
            cube(0, [1.0, 1.0, 1.0], [3.0, 2.0, 5.0]),
            cube(1, [4.0, 0.5, 2.0], [6.0, 4.0, 3.0]),
        ];
        let points: Vec<_> = (0..400)
            .map(|n| {
                let t = n as f64;
                Point3::new(
                    (t * 0.613).rem_euclid(7.0),
                    (t * 0.291).rem_euclid(5.0),
                    (t * 0.157).rem_euclid(6.0),
                )
            })
            .collect();

        let mut parallel = Analysis::from_parts(settings.clone(), solids.clone(), points.clone());
        settings.parallel = false;
        let mut serial = Analysis::from_parts(settings, solids, points);

        assert_eq!(parallel.run().unwrap().labels, serial.run().unwrap().labels);
    }

    #[test]
    fn nothing_to_classify() {
        let settings = load_default_config().unwrap();
        let mut analysis = Analysis::from_parts(settings, Vec::new(), Vec::new());
        let results = analysis.run().unwrap();
        assert!(results.labels.is_empty());
        assert_eq!(results.summary.num_points, 0);
    }

    #[test]
    fn writeup_before_run_fails() {
        let settings = load_default_config().unwrap();
        let analysis = Analysis::from_parts(settings, Vec::new(), Vec::new());
        assert!(analysis.writeup().is_err());
    }
}

/// One classification run over a scene.
#[derive(Debug)]
pub struct Analysis {
    pub settings: Settings,
    pub solids: Vec<Solid>,
    pub points: Vec<Point3<f64>>,
    /// Set by [`Analysis::run`].
    pub results: Option<Results>,
}

impl Analysis {
    /// Loads the geometry and points files named by `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let solids = ObjFile::new(&settings.geom_name)
            .tessellate()
            .with_context(|| format!("loading geometry from {}", settings.geom_name))?;
        let points = load_points(&settings.points_name)
            .with_context(|| format!("loading points from {}", settings.points_name))?;

        Ok(Self::from_parts(settings, solids, points))
    }

    pub fn from_parts(settings: Settings, solids: Vec<Solid>, points: Vec<Point3<f64>>) -> Self {
        Self {
            settings,
            solids,
            points,
            results: None,
        }
    }

    /// Region to index: the configured one, or the padded bounds of the
    /// solids and points. `None` when there is nothing to bound.
    pub fn region(&self) -> Option<Aabb> {
        if let Some(region) = &self.settings.region {
            return Some(region.aabb());
        }
        grid::region_for(
            &self.solids,
            &self.points,
            self.settings.padding,
            self.settings.step,
        )
    }

    /// Builds the grid and classifies every point.
    ///
    /// **How it Works**: All solids are hashed into the grid and the grid is
    /// finalised before any point is looked at. The filter then builds one BVH
    /// per solid and labels each point independently, so the parallel path
    /// returns exactly what the serial one does, in input order.
    pub fn run(&mut self) -> Result<&Results> {
        let start = Instant::now();

        let Some(region) = self.region() else {
            info!("no solids or points, nothing to classify");
            let summary = Summary::from_labels(&[], 0, [0, 0, 0], self.settings.step);
            return Ok(&*self.results.insert(Results::new(Vec::new(), summary)));
        };

        let mut builder = GridBuilder::new(self.settings.step, &region)?;
        builder.insert_all(&self.solids);
        let grid = builder.build();
        let counts = grid.layout().counts();

        let filter = PointFilter::new(&grid, &self.solids)?;

        info!(
            points = self.points.len(),
            solids = self.solids.len(),
            parallel = self.settings.parallel,
            "classifying points"
        );

        let pb = if self.settings.progress {
            ProgressBar::new(self.points.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>7}/{len:7} {msg} ETA: {eta_precise}",
            )?
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("points".to_string());

        let classify = |point: &Point3<f64>| {
            let label = filter.classify(point);
            pb.inc(1);
            label
        };
        let labels: Vec<Classification> = if self.settings.parallel {
            self.points.par_iter().map(classify).collect()
        } else {
            self.points.iter().map(classify).collect()
        };
        pb.finish_and_clear();

        let mut summary = Summary::from_labels(&labels, self.solids.len(), counts, self.settings.step);
        summary.elapsed_secs = start.elapsed().as_secs_f64();

        info!(
            free = summary.num_free,
            obstructed = summary.num_obstructed,
            elapsed = ?start.elapsed(),
            "classification complete"
        );

        Ok(&*self.results.insert(Results::new(labels, summary)))
    }

    /// Writes `free_points.txt`, `summary.json` and, when enabled,
    /// `labels.txt` into the output directory.
    pub fn writeup(&self) -> Result<()> {
        let results = self
            .results
            .as_ref()
            .context("no results to write, call run first")?;
        let directory = &self.settings.directory;
        output::ensure_directory(directory)?;

        output::write_points(
            &results.free_points(&self.points),
            &directory.join("free_points.txt"),
        )?;
        if self.settings.write_labels {
            output::write_labels(&self.points, &results.labels, &directory.join("labels.txt"))?;
        }
        output::write_summary(&results.summary, &directory.join("summary.json"))?;

        if results.summary.num_points > 0 && results.summary.num_free == 0 {
            warn!("every point is obstructed");
        }
        info!(directory = %directory.display(), "results written");
        println!("{}", results.summary);

        Ok(())
    }
}
