//! Sources of triangulated solids.
//!
//! The core never tessellates anything itself: whatever produces the solids
//! (a CAD host, a mesh file, a test) reduces them to triangles plus bounds and
//! hands them over through [`Tessellation`].

use std::path::PathBuf;

use nalgebra::Point3;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::geom::{Solid, SolidId, Triangle};


/// Anything that can supply the solids of a scene as triangle meshes.
pub trait Tessellation {
    fn tessellate(&self) -> Result<Vec<Solid>>;
}

impl Tessellation for [Solid] {
    fn tessellate(&self) -> Result<Vec<Solid>> {
        Ok(self.to_vec())
    }
}

impl Tessellation for Vec<Solid> {
    fn tessellate(&self) -> Result<Vec<Solid>> {
        self.as_slice().tessellate()
    }
}

/// Wavefront OBJ file; every object (or group) in it is one solid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjFile {
    path: PathBuf,
}

impl ObjFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Tessellation for ObjFile {
    /// Loads every model, triangulating polygonal faces.
    ///
    /// Solid ids are the model indices in the file, so they stay stable when
    /// a model without faces is skipped.
    fn tessellate(&self) -> Result<Vec<Solid>> {
        let options = tobj::LoadOptions {
            triangulate: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, _) = tobj::load_obj(&self.path, &options).map_err(|source| Error::ObjLoad {
            path: self.path.clone(),
            source,
        })?;

        let mut solids = Vec::with_capacity(models.len());
        for (index, model) in models.iter().enumerate() {
            let mesh = &model.mesh;
            let vertex = |i: u32| {
                let i = i as usize * 3;
                Point3::new(
                    f64::from(mesh.positions[i]),
                    f64::from(mesh.positions[i + 1]),
                    f64::from(mesh.positions[i + 2]),
                )
            };

            let triangles: Vec<Triangle> = mesh
                .indices
                .chunks_exact(3)
                .map(|tri| Triangle::new(vertex(tri[0]), vertex(tri[1]), vertex(tri[2])))
                .collect();

            if triangles.is_empty() {
                warn!(model = %model.name, "model has no faces, skipped");
                continue;
            }

            solids.push(Solid::from_triangles(SolidId(index), triangles)?.with_name(&model.name));
        }

        info!(
            path = %self.path.display(),
            solids = solids.len(),
            triangles = solids.iter().map(|s| s.triangles.len()).sum::<usize>(),
            "loaded solids"
        );

        Ok(solids)
    }
}
