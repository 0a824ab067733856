//! Batch classification of sample points against triangulated solids.
//!
//! Every solid's 2D footprint is hashed into a uniform 3D grid whose cells
//! keep an R-tree of the footprints overlapping them. A query point looks up
//! its cell, narrows the candidates to the footprints containing its `(x, y)`,
//! and casts a `+Z` ray through each candidate's BVH. An odd number of
//! crossings means the point is inside that solid.
//!
//! # Modules
//!
//! - [`geom`]: bounds, triangles, rays and solids
//! - [`intersect`]: ray/triangle and ray/box tests
//! - [`bvh`]: per-solid bounding volume hierarchy
//! - [`grid`]: spatial grid over solid footprints
//! - [`filter`]: free/obstructed classification
//! - [`tessellate`], [`points`]: inputs
//! - [`analysis`], [`result`], [`output`]: end-to-end runs
//! - [`settings`]: layered configuration

pub mod analysis;
pub mod bvh;
pub mod error;
pub mod filter;
pub mod geom;
pub mod grid;
pub mod intersect;
pub mod output;
pub mod points;
pub mod result;
pub mod settings;
pub mod tessellate;

pub use error::{Error, Result};
pub use filter::{filter_free, Classification, PointFilter};
pub use geom::{Aabb, Ray, Solid, SolidId, Triangle};
pub use grid::{Grid, GridBuilder};
