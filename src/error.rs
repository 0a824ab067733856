//! Error types for grid construction, mesh loading and classification.

use std::path::PathBuf;

use thiserror::Error;

use crate::geom::SolidId;

/// Errors raised by the classification core and its input adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// Grid cell edge length is zero, negative or not finite.
    #[error("grid step must be positive and finite, got {step}")]
    InvalidStep { step: f64 },

    /// Region to index has no volume along at least one axis.
    #[error("degenerate grid region: {details}")]
    DegenerateRegion { details: String },

    /// Ray direction is the zero vector (or not finite).
    #[error("ray direction must be non-zero and finite")]
    DegenerateRay,

    /// Solid has no triangles, so its bounds cannot be derived.
    #[error("solid {id} has no triangles")]
    EmptySolid { id: SolidId },

    /// Two solids passed to the same filter share an id.
    #[error("solid id {id} appears more than once")]
    DuplicateSolid { id: SolidId },

    /// Wavefront OBJ file could not be read.
    #[error("failed to load OBJ file {path}: {source}")]
    ObjLoad {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    /// Malformed line in a points file.
    #[error("line {line}: {details}")]
    PointParse { line: usize, details: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for the classification core.
pub type Result<T> = std::result::Result<T, Error>;
