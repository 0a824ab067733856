use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::geom::Aabb;


/// Tolerance of the ray/triangle test: parallel threshold on the determinant
/// and minimum accepted hit distance.
pub const INTERSECT_EPSILON: f64 = 1e-9;
/// Nodes with at most this many triangles become BVH leaves.
pub const LEAF_TRIANGLE_THRESHOLD: usize = 8;
/// Upper bound on the number of cells a grid may allocate.
pub const MAX_GRID_CELLS: usize = 1 << 26;
/// Prefix of environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "OCCLUDE";

/// Explicit region to index, as `min`/`max` corners.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Region {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Region {
    pub fn aabb(&self) -> Aabb {
        Aabb::new(Point3::from(self.min), Point3::from(self.max))
    }
}

/// Runtime configuration for an analysis run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    /// Grid cell edge length, in model units.
    pub step: f64,
    /// Wavefront OBJ file holding the solids, one object per solid.
    pub geom_name: String,
    /// Text file of query points, one `x y z` per line.
    pub points_name: String,
    /// Region to index. Derived from the solids and points when absent.
    #[serde(default)]
    pub region: Option<Region>,
    /// Margin added around a derived region.
    #[serde(default)]
    pub padding: f64,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_true")]
    pub progress: bool,
    #[serde(default)]
    pub write_labels: bool,
    /// Output directory.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("output")
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file.clone()).required(true))
        .build()
        .with_context(|| format!("loading {}", default_config_file.display()))?;

    let config: Settings = settings
        .try_deserialize()
        .context("deserializing default configuration")?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the layered configuration: file, then `OCCLUDE_*` environment
/// variables, then command-line flags.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let config_file = if local_config.exists() {
        tracing::info!(path = %local_config.display(), "using local configuration");
        local_config
    } else {
        tracing::info!(path = %default_config_file.display(), "using default configuration");
        default_config_file
    };

    let settings = Config::builder()
        .add_source(File::from(config_file.clone()).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()
        .with_context(|| format!("loading {}", config_file.display()))?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;

    apply_cli_args(&mut config, CliArgs::parse())?;

    validate_config(&config)?;

    tracing::debug!("{:#?}", config);

    Ok(config)
}

fn apply_cli_args(config: &mut Settings, args: CliArgs) -> Result<()> {
    if let Some(step) = args.step {
        config.step = step;
    }
    if let Some(geo) = args.geo {
        config.geom_name = geo;
    }
    if let Some(points) = args.points {
        config.points_name = points;
    }
    if let Some(values) = &args.region {
        config.region = Some(parse_region(values)?);
    }
    if let Some(padding) = args.padding {
        config.padding = padding;
    }
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if args.serial {
        config.parallel = false;
    }
    if args.quiet {
        config.progress = false;
    }
    if args.labels {
        config.write_labels = true;
    }
    Ok(())
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the OCCLUDE_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("OCCLUDE_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(|dir| dir.to_path_buf())
        .context("could not find project root directory")
}

fn validate_config(config: &Settings) -> Result<()> {
    if !(config.step > 0.0 && config.step.is_finite()) {
        bail!("Grid step must be positive and finite, got {}", config.step);
    }
    if !(config.padding >= 0.0) {
        bail!("Padding must be non-negative, got {}", config.padding);
    }
    if let Some(region) = &config.region {
        if !(0..3).all(|axis| region.min[axis] < region.max[axis]) {
            bail!(
                "Region min {:?} must be strictly below max {:?}",
                region.min,
                region.max
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "occlude - classify sample points as free or obstructed by solids")]
pub struct CliArgs {
    /// Grid cell edge length in model units.
    #[arg(short, long)]
    step: Option<f64>,

    /// File path to the input geometry. Each object in the file is one solid.
    /// Currently, only the Wavefront .obj format is supported.
    #[arg(short, long)]
    geo: Option<String>,

    /// File path to the query points, one `x y z` per line.
    #[arg(short, long)]
    points: Option<String>,

    /// Region to index.
    /// Format: xmin ymin zmin xmax ymax zmax
    #[arg(long, num_args = 6, value_delimiter = ' ', allow_negative_numbers = true)]
    region: Option<Vec<f64>>,

    /// Margin added around the region derived from solids and points.
    #[arg(long)]
    padding: Option<f64>,

    /// Output directory.
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Classify points on a single thread.
    #[arg(long)]
    serial: bool,

    /// Hide the progress bar.
    #[arg(short, long)]
    quiet: bool,

    /// Also write every point with its label.
    #[arg(long)]
    labels: bool,
}

/// Parse a region given as six values: three minimum then three maximum coordinates.
fn parse_region(values: &[f64]) -> Result<Region> {
    match values {
        [x0, y0, z0, x1, y1, z1] => Ok(Region {
            min: [*x0, *y0, *z0],
            max: [*x1, *y1, *z1],
        }),
        _ => bail!(
            "Region needs exactly 6 values (xmin ymin zmin xmax ymax zmax), got {}",
            values.len()
        ),
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Step: {:.6}
  - Geometry: {}
  - Points: {}
  - Region: {:?}
  - Padding: {:.6}
  - Parallel: {}
  - Output: {}
  ",
            self.step,
            self.geom_name,
            self.points_name,
            self.region,
            self.padding,
            self.parallel,
            self.directory.display(),
        )
    }
}
