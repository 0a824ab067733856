use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use nalgebra::Point3;

use crate::filter::Classification;
use crate::result::Summary;


fn format_point(point: &Point3<f64>) -> String {
    point.iter().join(" ")
}

/// Creates the output directory if needed.
pub fn ensure_directory(directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)
        .with_context(|| format!("creating output directory {}", directory.display()))
}

/// Write points as `x y z` lines.
pub fn write_points(points: &[Point3<f64>], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for point in points {
        writeln!(writer, "{}", format_point(point))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write every point followed by `free` or `obstructed <solid id>`.
pub fn write_labels(points: &[Point3<f64>], labels: &[Classification], path: &Path) -> Result<()> {
    if points.len() != labels.len() {
        bail!(
            "{} points but {} labels, cannot write {}",
            points.len(),
            labels.len(),
            path.display()
        );
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for (point, label) in points.iter().zip(labels) {
        match label {
            Classification::Free => writeln!(writer, "{} free", format_point(point))?,
            Classification::Obstructed(id) => {
                writeln!(writer, "{} obstructed {}", format_point(point), id)?
            }
        }
    }
    writer.flush()?;

    Ok(())
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary(summary: &Summary, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
