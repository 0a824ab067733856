//! Query point input.
//!
//! Points are plain text, one per line, as three coordinates separated by
//! whitespace and/or commas. Blank lines and anything after `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::Point3;
use tracing::info;

use crate::error::{Error, Result};


/// Reads points from a text file.
pub fn load_points(path: impl AsRef<Path>) -> Result<Vec<Point3<f64>>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let points = parse_points(BufReader::new(file))?;
    info!(path = %path.display(), points = points.len(), "loaded points");
    Ok(points)
}

/// Parses points from any buffered reader. Line numbers in errors are 1-based.
pub fn parse_points<R: BufRead>(reader: R) -> Result<Vec<Point3<f64>>> {
    let mut points = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let content = line.split('#').next().unwrap_or_default();

        let fields: Vec<&str> = content
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();

        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            return Err(Error::PointParse {
                line: number,
                details: format!("expected 3 coordinates, found {}", fields.len()),
            });
        }

        let mut coords = [0.0; 3];
        for (coord, field) in coords.iter_mut().zip(&fields) {
            let value: f64 = field.parse().map_err(|_| Error::PointParse {
                line: number,
                details: format!("'{}' is not a number", field),
            })?;
            if !value.is_finite() {
                return Err(Error::PointParse {
                    line: number,
                    details: format!("'{}' is not finite", field),
                });
            }
            *coord = value;
        }

        points.push(Point3::from(coords));
    }

    Ok(points)
}
